use serde::{Deserialize, Serialize};

/// A wire string that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The wire string doubles as the serde name; extra literals after `|`
/// are accepted on input only.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal $(| $alias:literal)*),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $s $(, alias = $alias)*)]
                $variant
            ),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s $(| $alias)* => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Priority {
    Urgent => "URGENT",
    NonUrgent => "NON_URGENT",
});

str_enum!(RequestStatus {
    Incomplete => "INCOMPLETE",
    CollectedSample => "COLLECTED_SAMPLE",
    SendingLab => "SENDING_LAB",
    Pending => "PENDING",
    Complete => "COMPLETE" | "COMPLETED",
});

str_enum!(UserRole {
    Doctor => "Doctor",
    CollectionAgent => "CollectionAgent",
    LabStaff => "LabStaff",
});

impl RequestStatus {
    /// Human-readable label, e.g. `SENDING LAB`.
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}
