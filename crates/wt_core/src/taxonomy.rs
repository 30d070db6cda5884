//! Category taxonomy: the closed set of disposal methods and, per method, the
//! ordered waste types valid for it.
//!
//! The taxonomy drives zero-filling and column generation downstream, so its
//! declared order is the canonical order of every table the engine emits.
//! Free-form labels from persisted records are matched here, once, after
//! folding (see [`fold_label`]); nothing past the normalizer compares strings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{Error as DeError, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::CoreError;

/// Fold a free-form category label into its matching key:
/// trim, lower-case, and drop whitespace, `_` and `-`.
///
/// `"  Energy Recovery "`, `"energy_recovery"` and `"ENERGYRECOVERY"` all fold
/// to `"energyrecovery"`. Matching on folded keys is exact; there is no fuzzy step.
pub fn fold_label(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

// ------------------------------- Disposal methods -------------------------------

/// Disposal method. Declaration order is the canonical column-group order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DisposalMethod {
    #[serde(rename = "landfilling")]
    Landfilling,
    #[serde(rename = "recycling")]
    Recycling,
    #[serde(rename = "composting")]
    Composting,
    #[serde(rename = "energy_recovery")]
    EnergyRecovery,
}

impl DisposalMethod {
    pub const ALL: [DisposalMethod; 4] = [
        DisposalMethod::Landfilling,
        DisposalMethod::Recycling,
        DisposalMethod::Composting,
        DisposalMethod::EnergyRecovery,
    ];

    /// Wire token (matches the serde rename).
    pub fn token(self) -> &'static str {
        match self {
            DisposalMethod::Landfilling => "landfilling",
            DisposalMethod::Recycling => "recycling",
            DisposalMethod::Composting => "composting",
            DisposalMethod::EnergyRecovery => "energy_recovery",
        }
    }

    /// Human label used in table headers.
    pub fn label(self) -> &'static str {
        match self {
            DisposalMethod::Landfilling => "Landfilling",
            DisposalMethod::Recycling => "Recycling",
            DisposalMethod::Composting => "Composting",
            DisposalMethod::EnergyRecovery => "Energy Recovery",
        }
    }

    /// Every method except landfilling diverts waste from the landfill.
    pub fn is_diversion(self) -> bool {
        !matches!(self, DisposalMethod::Landfilling)
    }

    /// Resolve a free-form label (token or display label) after folding.
    pub fn from_label(label: &str) -> Option<Self> {
        let key = fold_label(label);
        if key.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|m| fold_label(m.label()) == key)
    }
}

impl fmt::Display for DisposalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------- Waste types ----------------------------------

fn is_token(s: &str) -> bool {
    let len = s.len();
    if !(1..=64).contains(&len) {
        return false;
    }
    s.bytes()
        .all(|b| matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b':' | b'.'))
}

/// Canonical waste-type key as declared in the taxonomy (e.g. `FoodWaste`).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct WasteType(String);

impl WasteType {
    /// Unchecked constructor for built-in tables.
    pub(crate) fn from_token(s: &str) -> Self {
        WasteType(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header label: splits camel case, `"GeneralWaste"` → `"General Waste"`.
    pub fn label(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 4);
        let mut prev_lower = false;
        for ch in self.0.chars() {
            if ch == '_' || ch == '-' {
                out.push(' ');
                prev_lower = false;
                continue;
            }
            if ch.is_ascii_uppercase() && prev_lower {
                out.push(' ');
            }
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
        out
    }
}

impl fmt::Display for WasteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WasteType {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_token(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::InvalidToken(s.to_string()))
        }
    }
}

impl<'de> Deserialize<'de> for WasteType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        if is_token(&s) {
            Ok(WasteType(s))
        } else {
            Err(D::Error::invalid_value(
                Unexpected::Str(&s),
                &"token [A-Za-z0-9_.:-], len 1..=64",
            ))
        }
    }
}

// ------------------------------------ Taxonomy ------------------------------------

/// One disposal method with its ordered waste types (wire shape).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodGroup {
    pub method: DisposalMethod,
    pub waste_types: Vec<WasteType>,
}

/// Validated, immutable category taxonomy.
///
/// Invariants (checked by [`CategoryTaxonomy::new`]):
/// - all four disposal methods are present, each exactly once;
/// - every method declares at least one waste type;
/// - a waste type (by folded key) belongs to exactly one method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MethodGroup>", into = "Vec<MethodGroup>")]
pub struct CategoryTaxonomy {
    groups: Vec<MethodGroup>,
    /// folded waste-type key → (method, index within group)
    index: BTreeMap<String, (DisposalMethod, usize)>,
}

impl CategoryTaxonomy {
    pub fn new(groups: Vec<MethodGroup>) -> Result<Self, CoreError> {
        for m in DisposalMethod::ALL {
            match groups.iter().filter(|g| g.method == m).count() {
                0 => return Err(CoreError::MissingMethod(m.label())),
                1 => {}
                _ => return Err(CoreError::DuplicateMethod(m.label())),
            }
        }

        let mut index: BTreeMap<String, (DisposalMethod, usize)> = BTreeMap::new();
        for g in &groups {
            if g.waste_types.is_empty() {
                return Err(CoreError::EmptyMethod(g.method.label()));
            }
            for (i, wt) in g.waste_types.iter().enumerate() {
                if let Some((other, _)) = index.insert(fold_label(wt.as_str()), (g.method, i)) {
                    return Err(CoreError::SharedWasteType {
                        waste_type: wt.to_string(),
                        first: other.label(),
                        second: g.method.label(),
                    });
                }
            }
        }

        Ok(Self { groups, index })
    }

    /// Built-in campus taxonomy.
    pub fn campus_default() -> Self {
        fn group(method: DisposalMethod, types: &[&str]) -> MethodGroup {
            MethodGroup {
                method,
                waste_types: types.iter().map(|t| WasteType::from_token(t)).collect(),
            }
        }
        let groups = vec![
            group(DisposalMethod::Landfilling, &["GeneralWaste"]),
            group(
                DisposalMethod::Recycling,
                &["Paper", "Plastic", "Glass", "Metal", "EWaste"],
            ),
            group(DisposalMethod::Composting, &["FoodWaste", "GardenWaste"]),
            group(DisposalMethod::EnergyRecovery, &["WoodWaste", "RefuseDerivedFuel"]),
        ];
        match Self::new(groups) {
            Ok(t) => t,
            Err(e) => unreachable!("built-in taxonomy is valid: {e}"),
        }
    }

    /// Method groups in declared order.
    pub fn groups(&self) -> &[MethodGroup] {
        &self.groups
    }

    /// Disposal methods in declared order.
    pub fn methods(&self) -> impl Iterator<Item = DisposalMethod> + '_ {
        self.groups.iter().map(|g| g.method)
    }

    /// Waste types of `method` in declared order (empty slice is unreachable for a valid taxonomy).
    pub fn types_of(&self, method: DisposalMethod) -> &[WasteType] {
        self.groups
            .iter()
            .find(|g| g.method == method)
            .map(|g| g.waste_types.as_slice())
            .unwrap_or(&[])
    }

    /// Every (method, type) pair in declared order.
    pub fn pairs(&self) -> impl Iterator<Item = (DisposalMethod, &WasteType)> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.waste_types.iter().map(move |t| (g.method, t)))
    }

    /// Number of (method, type) columns.
    pub fn pair_count(&self) -> usize {
        self.groups.iter().map(|g| g.waste_types.len()).sum()
    }

    pub fn resolve_method(&self, label: &str) -> Option<DisposalMethod> {
        DisposalMethod::from_label(label)
    }

    /// Resolve a free-form waste-type label under `method`.
    /// A type declared under another method does not resolve.
    pub fn resolve_type(&self, method: DisposalMethod, label: &str) -> Option<&WasteType> {
        let (owner, i) = self.index.get(&fold_label(label))?;
        if *owner != method {
            return None;
        }
        self.types_of(method).get(*i)
    }

    /// Method that declares `label`, whichever it is.
    pub fn owner_of(&self, label: &str) -> Option<DisposalMethod> {
        self.index.get(&fold_label(label)).map(|(m, _)| *m)
    }

    pub fn is_valid_type(&self, method: DisposalMethod, waste_type: &WasteType) -> bool {
        self.resolve_type(method, waste_type.as_str()) == Some(waste_type)
    }
}

impl TryFrom<Vec<MethodGroup>> for CategoryTaxonomy {
    type Error = CoreError;
    fn try_from(groups: Vec<MethodGroup>) -> Result<Self, Self::Error> {
        Self::new(groups)
    }
}

impl From<CategoryTaxonomy> for Vec<MethodGroup> {
    fn from(t: CategoryTaxonomy) -> Self {
        t.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wt(s: &str) -> WasteType {
        s.parse().unwrap()
    }

    #[test]
    fn fold_label_ignores_case_and_separators() {
        assert_eq!(fold_label("  Energy Recovery "), "energyrecovery");
        assert_eq!(fold_label("energy_recovery"), "energyrecovery");
        assert_eq!(fold_label("Food-Waste"), "foodwaste");
        assert_eq!(fold_label("   "), "");
    }

    #[test]
    fn methods_resolve_from_tokens_and_labels() {
        assert_eq!(DisposalMethod::from_label("RECYCLING"), Some(DisposalMethod::Recycling));
        assert_eq!(
            DisposalMethod::from_label("energy recovery"),
            Some(DisposalMethod::EnergyRecovery)
        );
        assert_eq!(
            DisposalMethod::from_label("energy_recovery"),
            Some(DisposalMethod::EnergyRecovery)
        );
        assert_eq!(DisposalMethod::from_label("Burning"), None);
        assert_eq!(DisposalMethod::from_label(""), None);
    }

    #[test]
    fn default_taxonomy_order_is_declared_order() {
        let t = CategoryTaxonomy::campus_default();
        let methods: Vec<_> = t.methods().collect();
        assert_eq!(methods, DisposalMethod::ALL.to_vec());
        assert_eq!(t.types_of(DisposalMethod::Recycling)[0].as_str(), "Paper");
        assert_eq!(t.pair_count(), t.pairs().count());
    }

    #[test]
    fn resolve_type_is_scoped_to_method() {
        let t = CategoryTaxonomy::campus_default();
        assert_eq!(
            t.resolve_type(DisposalMethod::Recycling, " paper ").map(WasteType::as_str),
            Some("Paper")
        );
        assert!(t.resolve_type(DisposalMethod::Landfilling, "Paper").is_none());
        assert_eq!(t.owner_of("food waste"), Some(DisposalMethod::Composting));
        assert!(t.is_valid_type(DisposalMethod::Composting, &wt("FoodWaste")));
        assert!(!t.is_valid_type(DisposalMethod::Recycling, &wt("FoodWaste")));
    }

    #[test]
    fn shared_type_is_rejected() {
        let mut groups: Vec<MethodGroup> = CategoryTaxonomy::campus_default().into();
        groups[1].waste_types.push(wt("general_waste"));
        let err = CategoryTaxonomy::new(groups).unwrap_err();
        assert!(matches!(err, CoreError::SharedWasteType { .. }));
    }

    #[test]
    fn missing_and_empty_methods_are_rejected() {
        let mut groups: Vec<MethodGroup> = CategoryTaxonomy::campus_default().into();
        groups.pop();
        assert_eq!(
            CategoryTaxonomy::new(groups).unwrap_err(),
            CoreError::MissingMethod("Energy Recovery")
        );

        let mut groups: Vec<MethodGroup> = CategoryTaxonomy::campus_default().into();
        groups[2].waste_types.clear();
        assert_eq!(
            CategoryTaxonomy::new(groups).unwrap_err(),
            CoreError::EmptyMethod("Composting")
        );
    }

    #[test]
    fn taxonomy_round_trips_through_wire_shape() {
        let t = CategoryTaxonomy::campus_default();
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v[0]["method"], "landfilling");
        let back: CategoryTaxonomy = serde_json::from_value(v).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn waste_type_label_splits_camel_case() {
        assert_eq!(wt("GeneralWaste").label(), "General Waste");
        assert_eq!(wt("food_waste").label(), "food waste");
        assert!("has space".parse::<WasteType>().is_err());
    }
}
