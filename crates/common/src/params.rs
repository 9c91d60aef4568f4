use serde::{Deserialize, Serialize};

/// Typed value carried by a [`Param`].
///
/// Array-valued types hold flat component lists: a `Point` with two entries
/// stores six floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Float(Vec<f32>),
    Integer(Vec<i32>),
    Bool(Vec<bool>),
    String(Vec<String>),
    Point(Vec<f32>),
    Vector(Vec<f32>),
    Normal(Vec<f32>),
    Color(Vec<f32>),
    Texture(String),
}

impl ParamValue {
    /// Semantic type keyword as used in renderer statements.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Integer(_) => "integer",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Point(_) => "point",
            Self::Vector(_) => "vector",
            Self::Normal(_) => "normal",
            Self::Color(_) => "color",
            Self::Texture(_) => "texture",
        }
    }
}

/// One `(name, type, value)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(flatten)]
    pub value: ParamValue,
}

/// Ordered, typed property bag used as the payload of every renderer statement.
///
/// Insertion order is preserved so that emitted output is deterministic.
/// Adding a name that is already present replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    params: Vec<Param>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter and return the set for chaining.
    pub fn add(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.push(name, value);
        self
    }

    /// In-place form of [`ParamSet::add`].
    pub fn push(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.params.push(Param { name, value }),
        }
    }

    pub fn add_float(self, name: impl Into<String>, v: f32) -> Self {
        self.add(name, ParamValue::Float(vec![v]))
    }

    pub fn add_floats(self, name: impl Into<String>, v: Vec<f32>) -> Self {
        self.add(name, ParamValue::Float(v))
    }

    pub fn add_integer(self, name: impl Into<String>, v: i32) -> Self {
        self.add(name, ParamValue::Integer(vec![v]))
    }

    pub fn add_integers(self, name: impl Into<String>, v: Vec<i32>) -> Self {
        self.add(name, ParamValue::Integer(v))
    }

    pub fn add_bool(self, name: impl Into<String>, v: bool) -> Self {
        self.add(name, ParamValue::Bool(vec![v]))
    }

    pub fn add_string(self, name: impl Into<String>, v: impl Into<String>) -> Self {
        self.add(name, ParamValue::String(vec![v.into()]))
    }

    pub fn add_point(self, name: impl Into<String>, v: [f32; 3]) -> Self {
        self.add(name, ParamValue::Point(v.to_vec()))
    }

    pub fn add_points(self, name: impl Into<String>, v: Vec<f32>) -> Self {
        self.add(name, ParamValue::Point(v))
    }

    pub fn add_vector(self, name: impl Into<String>, v: [f32; 3]) -> Self {
        self.add(name, ParamValue::Vector(v.to_vec()))
    }

    pub fn add_normals(self, name: impl Into<String>, v: Vec<f32>) -> Self {
        self.add(name, ParamValue::Normal(v))
    }

    pub fn add_color(self, name: impl Into<String>, v: [f32; 3]) -> Self {
        self.add(name, ParamValue::Color(v.to_vec()))
    }

    pub fn add_texture(self, name: impl Into<String>, texture: impl Into<String>) -> Self {
        self.add(name, ParamValue::Texture(texture.into()))
    }

    /// Merge `other` into this set: known names are overwritten in place,
    /// new names are appended in `other`'s order.
    pub fn update(&mut self, other: &ParamSet) {
        for p in &other.params {
            self.push(p.name.clone(), p.value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_preserved() {
        let ps = ParamSet::new()
            .add_float("gain", 1.0)
            .add_string("name", "x")
            .add_bool("flag", true);
        let names: Vec<&str> = ps.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["gain", "name", "flag"]);
    }

    #[test]
    fn add_existing_name_replaces_in_place() {
        let ps = ParamSet::new()
            .add_float("a", 1.0)
            .add_float("b", 2.0)
            .add_float("a", 3.0);
        assert_eq!(ps.len(), 2);
        assert_eq!(ps.iter().next().unwrap().value, ParamValue::Float(vec![3.0]));
    }

    #[test]
    fn update_overwrites_and_appends() {
        let mut base = ParamSet::new().add_float("a", 1.0).add_float("b", 2.0);
        let extra = ParamSet::new().add_float("b", 5.0).add_integer("c", 7);
        base.update(&extra);
        let names: Vec<&str> = base.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(base.get("b"), Some(&ParamValue::Float(vec![5.0])));
        assert_eq!(base.get("c"), Some(&ParamValue::Integer(vec![7])));
    }

    #[test]
    fn type_names() {
        assert_eq!(ParamValue::Color(vec![1.0; 3]).type_name(), "color");
        assert_eq!(ParamValue::Texture("t".into()).type_name(), "texture");
        assert_eq!(ParamValue::Normal(vec![]).type_name(), "normal");
    }

    #[test]
    fn serializes_as_ordered_records() {
        let ps = ParamSet::new().add_float("gain", 2.0).add_texture("Kd", "wood");
        let json = serde_json::to_value(&ps).unwrap();
        assert_eq!(json[0]["name"], "gain");
        assert_eq!(json[0]["type"], "float");
        assert_eq!(json[1]["type"], "texture");
        assert_eq!(json[1]["value"], "wood");
    }
}
