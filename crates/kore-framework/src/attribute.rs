//! Operator attributes and their validation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FrameworkError;
use crate::Result;

/// Attribute name → value.
pub type AttributeMap = BTreeMap<String, Attribute>;

/// A typed attribute value.
///
/// `Blank` is the empty state returned by nullable lookups; it is never
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Attribute {
    Int(i32),
    Float(f32),
    String(String),
    Bool(bool),
    Long(i64),
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Strings(Vec<String>),
    Bools(Vec<bool>),
    Longs(Vec<i64>),
    #[serde(skip)]
    Blank,
}

/// Discriminant of an [`Attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    Int,
    Float,
    String,
    Bool,
    Long,
    Ints,
    Floats,
    Strings,
    Bools,
    Longs,
    Blank,
}

impl Attribute {
    pub fn attr_type(&self) -> AttrType {
        match self {
            Attribute::Int(_) => AttrType::Int,
            Attribute::Float(_) => AttrType::Float,
            Attribute::String(_) => AttrType::String,
            Attribute::Bool(_) => AttrType::Bool,
            Attribute::Long(_) => AttrType::Long,
            Attribute::Ints(_) => AttrType::Ints,
            Attribute::Floats(_) => AttrType::Floats,
            Attribute::Strings(_) => AttrType::Strings,
            Attribute::Bools(_) => AttrType::Bools,
            Attribute::Longs(_) => AttrType::Longs,
            Attribute::Blank => AttrType::Blank,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Attribute::Blank)
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::Int => "int",
            AttrType::Float => "float",
            AttrType::String => "string",
            AttrType::Bool => "bool",
            AttrType::Long => "long",
            AttrType::Ints => "ints",
            AttrType::Floats => "floats",
            AttrType::Strings => "strings",
            AttrType::Bools => "bools",
            AttrType::Longs => "longs",
            AttrType::Blank => "blank",
        };
        f.write_str(name)
    }
}

/// Rust types that can be read out of an [`Attribute`].
pub trait FromAttribute: Sized {
    const ATTR_TYPE: AttrType;

    fn from_attribute(attr: &Attribute) -> Option<Self>;
}

macro_rules! impl_attribute_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromAttribute for $ty {
                const ATTR_TYPE: AttrType = AttrType::$variant;

                fn from_attribute(attr: &Attribute) -> Option<Self> {
                    match attr {
                        Attribute::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Attribute {
                fn from(v: $ty) -> Self {
                    Attribute::$variant(v)
                }
            }
        )*
    };
}

impl_attribute_value! {
    i32 => Int,
    f32 => Float,
    String => String,
    bool => Bool,
    i64 => Long,
    Vec<i32> => Ints,
    Vec<f32> => Floats,
    Vec<String> => Strings,
    Vec<bool> => Bools,
    Vec<i64> => Longs,
}

impl From<&str> for Attribute {
    fn from(v: &str) -> Self {
        Attribute::String(v.to_string())
    }
}

/// Extract a typed value, failing with a type mismatch naming `name`.
pub fn get_attr<T: FromAttribute>(name: &str, attr: &Attribute) -> Result<T> {
    T::from_attribute(attr).ok_or_else(|| FrameworkError::AttributeTypeMismatch {
        name: name.to_string(),
        expected: T::ATTR_TYPE,
        got: attr.attr_type(),
    })
}

// =============================================================================
// Checker
// =============================================================================

type CheckFn<T> = Box<dyn Fn(&T) -> std::result::Result<(), String> + Send + Sync>;

/// Validation rule for one attribute.
///
/// A rule without a default makes the attribute required.
pub struct AttrRule<T> {
    name: String,
    default: Option<T>,
    checks: Vec<CheckFn<T>>,
}

impl<T> AttrRule<T>
where
    T: FromAttribute + Into<Attribute> + Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            checks: Vec::new(),
        }
    }

    /// Value filled in when the attribute is absent.
    pub fn with_default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Add a predicate; `Err(reason)` rejects the value.
    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.checks.push(Box::new(f));
        self
    }
}

impl<T> AttrRule<T>
where
    T: FromAttribute + Into<Attribute> + Clone + PartialOrd + fmt::Debug + Send + Sync + 'static,
{
    pub fn greater_than(self, bound: T) -> Self {
        self.check(move |v| {
            if *v > bound {
                Ok(())
            } else {
                Err(format!("larger_than check fail: {v:?} is not greater than {bound:?}"))
            }
        })
    }
}

trait AttrCheck: Send + Sync {
    fn apply(&self, op_type: &str, attrs: &mut AttributeMap) -> Result<()>;
}

impl<T> AttrCheck for AttrRule<T>
where
    T: FromAttribute + Into<Attribute> + Clone + Send + Sync + 'static,
{
    fn apply(&self, op_type: &str, attrs: &mut AttributeMap) -> Result<()> {
        if !attrs.contains_key(&self.name) {
            match &self.default {
                Some(v) => {
                    attrs.insert(self.name.clone(), v.clone().into());
                }
                None => {
                    return Err(FrameworkError::MissingAttribute {
                        op_type: op_type.to_string(),
                        name: self.name.clone(),
                    })
                }
            }
        }
        let attr = attrs.get(&self.name).ok_or_else(|| FrameworkError::MissingAttribute {
            op_type: op_type.to_string(),
            name: self.name.clone(),
        })?;
        let value: T = get_attr(&self.name, attr)?;
        for check in &self.checks {
            check(&value).map_err(|reason| FrameworkError::InvalidAttribute {
                op_type: op_type.to_string(),
                name: self.name.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

/// Ordered set of attribute rules for one operator type.
#[derive(Default)]
pub struct OpAttrChecker {
    rules: Vec<Box<dyn AttrCheck>>,
}

impl OpAttrChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T>(&mut self, rule: AttrRule<T>) -> &mut Self
    where
        T: FromAttribute + Into<Attribute> + Clone + Send + Sync + 'static,
    {
        self.rules.push(Box::new(rule));
        self
    }

    /// Fill defaults into `attrs` and run every rule in insertion order.
    pub fn check(&self, op_type: &str, attrs: &mut AttributeMap) -> Result<()> {
        for rule in &self.rules {
            rule.apply(op_type, attrs)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for OpAttrChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpAttrChecker(rules={})", self.rules.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_extraction() {
        let attr = Attribute::from(3.5f32);
        assert_eq!(get_attr::<f32>("scale", &attr).unwrap(), 3.5);

        let err = get_attr::<i32>("scale", &attr).unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::AttributeTypeMismatch {
                expected: AttrType::Int,
                got: AttrType::Float,
                ..
            }
        ));

        let names: Vec<String> = get_attr("vars", &Attribute::Strings(vec!["a".into()])).unwrap();
        assert_eq!(names, vec!["a".to_string()]);
        assert_eq!(Attribute::from("x").attr_type(), AttrType::String);
    }

    #[test]
    fn test_default_filled() {
        let mut checker = OpAttrChecker::new();
        checker.add(AttrRule::<f32>::new("scale").with_default(1.0).greater_than(0.0));

        let mut attrs = AttributeMap::new();
        checker.check("cos_sim", &mut attrs).unwrap();
        assert_eq!(attrs["scale"], Attribute::Float(1.0));
    }

    #[test]
    fn test_greater_than() {
        let mut checker = OpAttrChecker::new();
        checker.add(AttrRule::<f32>::new("scale").with_default(1.0).greater_than(0.0));

        let mut attrs = AttributeMap::new();
        attrs.insert("scale".into(), Attribute::Float(-2.0));
        let err = checker.check("cos_sim", &mut attrs).unwrap_err();
        assert!(err.to_string().contains("larger_than check fail"));
    }

    #[test]
    fn test_required_and_custom() {
        let mut checker = OpAttrChecker::new();
        checker.add(AttrRule::<i32>::new("test_attr").check(|v| {
            if v % 2 == 0 {
                Ok(())
            } else {
                Err("'test_attr' must be even!".into())
            }
        }));

        let mut attrs = AttributeMap::new();
        let err = checker.check("my_test_op", &mut attrs).unwrap_err();
        assert!(matches!(err, FrameworkError::MissingAttribute { ref name, .. } if name == "test_attr"));

        attrs.insert("test_attr".into(), Attribute::Int(3));
        let err = checker.check("my_test_op", &mut attrs).unwrap_err();
        assert!(err.to_string().contains("must be even"));

        attrs.insert("test_attr".into(), Attribute::Int(4));
        checker.check("my_test_op", &mut attrs).unwrap();
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut checker = OpAttrChecker::new();
        checker.add(AttrRule::<i32>::new("axis").with_default(0));
        let mut attrs = AttributeMap::new();
        attrs.insert("axis".into(), Attribute::String("zero".into()));
        assert!(checker.check("concat", &mut attrs).is_err());
    }
}
