use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Utc};
use penmark_contracts::{DocumentMeta, FieldType};

use crate::SignFieldError;

/// The persisted representation of a raw submission. Exactly one "slot" is
/// populated for signature types; text-like types only ever set
/// `custom_text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedValue {
    pub custom_text: Option<String>,
    pub signature_image_as_base64: Option<String>,
    pub typed_signature: Option<String>,
}

impl NormalizedValue {
    /// The signature artifact, image representation first (it wins when a
    /// caller somehow supplies both).
    pub fn artifact(&self) -> Option<&str> {
        self.signature_image_as_base64
            .as_deref()
            .or(self.typed_signature.as_deref())
    }
}

/// Pure type dispatch from raw input to persisted values. DATE fields ignore
/// the caller-supplied value entirely and format `now` with the document's
/// configured (or default) offset and pattern.
pub fn normalize_value(
    field_type: FieldType,
    value: &str,
    is_base64: bool,
    meta: &DocumentMeta,
    now: DateTime<Utc>,
) -> Result<NormalizedValue, SignFieldError> {
    match field_type {
        FieldType::Signature | FieldType::FreeSignature => {
            if value.trim().is_empty() {
                return Err(SignFieldError::Validation(
                    "signature field must have a signature",
                ));
            }
            if is_base64 {
                Ok(NormalizedValue {
                    signature_image_as_base64: Some(value.to_string()),
                    ..NormalizedValue::default()
                })
            } else {
                Ok(NormalizedValue {
                    typed_signature: Some(value.to_string()),
                    ..NormalizedValue::default()
                })
            }
        }
        FieldType::Date => Ok(NormalizedValue {
            custom_text: Some(format_document_date(meta, now)?),
            ..NormalizedValue::default()
        }),
        FieldType::Email | FieldType::Name | FieldType::Text => Ok(NormalizedValue {
            custom_text: Some(value.to_string()),
            ..NormalizedValue::default()
        }),
    }
}

fn format_document_date(
    meta: &DocumentMeta,
    now: DateTime<Utc>,
) -> Result<String, SignFieldError> {
    let offset = meta
        .timezone_or_default()
        .parse::<FixedOffset>()
        .map_err(|_| {
            SignFieldError::Validation("document timezone is not a valid UTC offset")
        })?;

    let pattern = meta.date_format_or_default();
    let items = StrftimeItems::new(pattern).collect::<Vec<_>>();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(SignFieldError::Validation(
            "document date format is not a valid strftime pattern",
        ));
    }

    Ok(now
        .with_timezone(&offset)
        .format_with_items(items.into_iter())
        .to_string())
}
