use log::{debug, warn};
use miette::Diagnostic;
use thiserror::Error;

/// Key resolved by the parser for one field, before it is narrowed into the field itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldKeyRecord {
    pub key: i64,
    /// `true` when the compiler chose the key because the source did not.
    pub auto_assigned: bool,
}

impl FieldKeyRecord {
    /// Narrows the key to the 32-bit width stored on a field.
    pub fn narrow(&self) -> Result<i32, KeyError> {
        i32::try_from(self.key).map_err(|_| KeyError::OutOfRange { key: self.key })
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum KeyError {
    #[error("Field key {key} does not fit in 32 bits")]
    #[diagnostic(code(tidl::key::out_of_range))]
    OutOfRange { key: i64 },
    #[error("No field key specified for `{field}`")]
    #[diagnostic(code(tidl::key::implicit), help("implicit field keys are not allowed in strict mode; give `{field}` an explicit key"))]
    ImplicitKey { field: String },
}

/// How the [`KeyAllocator`] treats keys the user wrote (or did not write).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyPolicy {
    /// Accept explicit zero or negative keys instead of replacing them.
    pub allow_negative_keys: bool,
    /// Reject fields without an explicit key.
    pub strict_implicit_keys: bool,
}

/// Range a key must fit in to be representable on the wire.
const WIRE_KEY_RANGE: std::ops::RangeInclusive<i64> = (i16::MIN as i64)..=(i16::MAX as i64);

const FIRST_AUTO_KEY: i64 = -1;

/// Assigns field keys while a structure is being parsed.
///
/// Auto-assigned keys count down from `-1` so they never collide with the positive
/// keys users write. Call [`KeyAllocator::reset`] before each structure.
#[derive(Debug, Clone)]
pub struct KeyAllocator {
    policy: KeyPolicy,
    next_auto_key: i64,
}

impl KeyAllocator {
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            policy,
            next_auto_key: FIRST_AUTO_KEY,
        }
    }

    pub fn reset(&mut self) {
        self.next_auto_key = FIRST_AUTO_KEY;
    }

    pub fn resolve(&mut self, explicit: Option<i64>, field_name: &str) -> Result<FieldKeyRecord, KeyError> {
        let record = match explicit {
            Some(key) if key > 0 => FieldKeyRecord { key, auto_assigned: false },
            Some(key) if self.policy.allow_negative_keys => {
                // Narrow first so the cursor below the key stays representable.
                let narrowed = FieldKeyRecord { key, auto_assigned: false }.narrow()?;
                if key != self.next_auto_key {
                    warn!(
                        "Nonpositive field key ({}) for `{}` differs from what would be auto-assigned ({})",
                        key, field_name, self.next_auto_key
                    );
                }
                self.next_auto_key = i64::from(narrowed) - 1;
                FieldKeyRecord { key, auto_assigned: false }
            }
            Some(key) => {
                warn!("Nonpositive value ({}) not allowed as a field key for `{}`", key, field_name);
                self.next_auto()?
            }
            None => {
                if self.policy.strict_implicit_keys {
                    return Err(KeyError::ImplicitKey { field: field_name.to_string() });
                }
                warn!(
                    "No field key specified for `{}`, resulting protocol may have conflicts or not be backwards compatible",
                    field_name
                );
                self.next_auto()?
            }
        };

        if !WIRE_KEY_RANGE.contains(&record.key) {
            warn!(
                "Field key ({}) for `{}` exceeds allowed range ({}..{})",
                record.key,
                field_name,
                WIRE_KEY_RANGE.start(),
                WIRE_KEY_RANGE.end()
            );
        }
        record.narrow()?;

        debug!("Resolved key {} for `{}` (auto-assigned: {})", record.key, field_name, record.auto_assigned);
        Ok(record)
    }

    fn next_auto(&mut self) -> Result<FieldKeyRecord, KeyError> {
        let key = self.next_auto_key;
        self.next_auto_key = key.checked_sub(1).ok_or(KeyError::OutOfRange { key })?;
        Ok(FieldKeyRecord { key, auto_assigned: true })
    }
}

impl Default for KeyAllocator {
    fn default() -> Self {
        Self::new(KeyPolicy::default())
    }
}
