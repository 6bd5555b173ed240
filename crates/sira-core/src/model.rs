use crate::config::UnknownFlagPolicy;
use crate::error::SiraError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Susceptibility testing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "MIC")]
    Mic,
    #[serde(rename = "DISC")]
    Disc,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Mic => write!(f, "MIC"),
            Method::Disc => write!(f, "DISC"),
        }
    }
}

impl Method {
    pub fn from_str_loose(s: &str) -> Option<Method> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MIC" => Some(Method::Mic),
            "DISC" | "DISK" => Some(Method::Disc),
            _ => None,
        }
    }
}

/// Method as supplied by a caller. Unrecognized tags are kept verbatim so
/// the result can say what was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MethodTag {
    Known(Method),
    Unrecognized(String),
}

impl From<String> for MethodTag {
    fn from(s: String) -> Self {
        match Method::from_str_loose(&s) {
            Some(m) => MethodTag::Known(m),
            None => MethodTag::Unrecognized(s),
        }
    }
}

impl From<MethodTag> for String {
    fn from(tag: MethodTag) -> Self {
        tag.to_string()
    }
}

impl From<Method> for MethodTag {
    fn from(m: Method) -> Self {
        MethodTag::Known(m)
    }
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodTag::Known(m) => write!(f, "{m}"),
            MethodTag::Unrecognized(s) => write!(f, "{s}"),
        }
    }
}

/// Recognized resistance-phenotype markers. Declaration order is the
/// order in which overrides are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phenotype {
    /// Extended-spectrum beta-lactamase producer.
    Esbl,
    /// AmpC beta-lactamase producer.
    Ampc,
    /// Carbapenemase producer.
    Carbapenemase,
    /// Methicillin-resistant Staphylococcus aureus.
    Mrsa,
    /// Vancomycin-resistant enterococcus.
    Vre,
}

impl Phenotype {
    pub const ALL: [Phenotype; 5] = [
        Phenotype::Esbl,
        Phenotype::Ampc,
        Phenotype::Carbapenemase,
        Phenotype::Mrsa,
        Phenotype::Vre,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phenotype::Esbl => "esbl",
            Phenotype::Ampc => "ampc",
            Phenotype::Carbapenemase => "carbapenemase",
            Phenotype::Mrsa => "mrsa",
            Phenotype::Vre => "vre",
        }
    }

    /// Case-insensitive lookup; also accepts the `is_esbl` style used by
    /// some upstream parsers.
    pub fn from_str_loose(s: &str) -> Option<Phenotype> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("is_").unwrap_or(&lower);
        Phenotype::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Phenotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_ascii_uppercase())
    }
}

/// The set of phenotype flags that are `true` for a measurement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags(BTreeSet<Phenotype>);

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, flag: Phenotype) -> Self {
        self.0.insert(flag);
        self
    }

    pub fn is_set(&self, flag: Phenotype) -> bool {
        self.0.contains(&flag)
    }

    /// Set flags in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = Phenotype> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from an untyped name -> bool map. Unrecognized names are
    /// dropped with a warning or rejected, depending on `policy`.
    pub fn from_raw(
        raw: &BTreeMap<String, bool>,
        policy: UnknownFlagPolicy,
    ) -> Result<FeatureFlags, SiraError> {
        let mut flags = FeatureFlags::new();
        for (name, &value) in raw {
            match Phenotype::from_str_loose(name) {
                Some(p) => {
                    if value {
                        flags.0.insert(p);
                    }
                }
                None => match policy {
                    UnknownFlagPolicy::Reject => {
                        return Err(SiraError::UnrecognizedFlag(name.clone()))
                    }
                    UnknownFlagPolicy::Warn => {
                        tracing::warn!(flag = %name, "ignoring unrecognized feature flag");
                    }
                },
            }
        }
        Ok(flags)
    }
}

/// One susceptibility measurement, ready for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub organism: String,
    pub antibiotic: String,
    pub method: Option<MethodTag>,
    pub mic_value: Option<Decimal>,
    pub disc_zone_mm: Option<Decimal>,
    #[serde(default, skip_serializing_if = "FeatureFlags::is_empty")]
    pub flags: FeatureFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specimen_id: Option<String>,
}

impl Measurement {
    pub fn mic(organism: &str, antibiotic: &str, value: Decimal) -> Self {
        Measurement {
            organism: organism.into(),
            antibiotic: antibiotic.into(),
            method: Some(MethodTag::Known(Method::Mic)),
            mic_value: Some(value),
            disc_zone_mm: None,
            flags: FeatureFlags::new(),
            specimen_id: None,
        }
    }

    pub fn disc(organism: &str, antibiotic: &str, zone_mm: Decimal) -> Self {
        Measurement {
            organism: organism.into(),
            antibiotic: antibiotic.into(),
            method: Some(MethodTag::Known(Method::Disc)),
            mic_value: None,
            disc_zone_mm: Some(zone_mm),
            flags: FeatureFlags::new(),
            specimen_id: None,
        }
    }

    pub fn with_flag(mut self, flag: Phenotype) -> Self {
        self.flags = self.flags.with(flag);
        self
    }

    pub fn with_specimen(mut self, id: &str) -> Self {
        self.specimen_id = Some(id.into());
        self
    }
}

/// Measurement as received from an upstream message parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub organism: String,
    pub antibiotic: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub mic_value: Option<Decimal>,
    #[serde(default, alias = "disc_zone")]
    pub disc_zone_mm: Option<Decimal>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub specimen_id: Option<String>,
}

impl MeasurementRecord {
    pub fn into_measurement(self, policy: UnknownFlagPolicy) -> Result<Measurement, SiraError> {
        for (field, value) in [("mic_value", self.mic_value), ("disc_zone_mm", self.disc_zone_mm)] {
            if let Some(v) = value {
                if v.is_sign_negative() && !v.is_zero() {
                    return Err(SiraError::InvalidMeasurement(format!(
                        "{field} must not be negative (got {v})"
                    )));
                }
            }
        }

        let flags = FeatureFlags::from_raw(&self.flags, policy)?;
        let method = self
            .method
            .filter(|m| !m.trim().is_empty())
            .map(MethodTag::from);

        Ok(Measurement {
            organism: self.organism,
            antibiotic: self.antibiotic,
            method,
            mic_value: self.mic_value,
            disc_zone_mm: self.disc_zone_mm,
            flags,
            specimen_id: self.specimen_id,
        })
    }
}
