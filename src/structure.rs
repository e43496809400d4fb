//! Structural kinds: composites, sequences, optionals and delimiter-wrapped
//! items.

use std::collections::HashSet;
use std::fmt;

use crate::correlation::Correlation;
use crate::descriptor::Descriptor;
use crate::error::ConfigError;
use crate::field::check_name;

/// Inclusive bounds on the number of elements in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Multiplicity {
    min: usize,
    max: usize,
}

impl Multiplicity {
    /// Bounds may be given in either order. The upper bound must be positive.
    pub fn new(a: usize, b: usize) -> Result<Self, ConfigError> {
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        if max == 0 {
            return Err(ConfigError::InvalidMultiplicity { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// An ordered, fixed list of named children.
#[derive(Debug, Clone)]
pub struct Composite {
    name: String,
    children: Vec<Descriptor>,
}

impl Composite {
    pub fn new(name: impl Into<String>, children: Vec<Descriptor>) -> Result<Self, ConfigError> {
        let name = name.into();
        check_name(&name)?;
        let mut names = HashSet::new();
        for (i, child) in children.iter().enumerate() {
            if children[..i].iter().any(|earlier| earlier.same(child)) {
                return Err(ConfigError::RepeatedDescriptor {
                    composite: name,
                    name: child.name().to_string(),
                });
            }
            if !names.insert(child.name()) {
                return Err(ConfigError::DuplicateChild {
                    composite: name,
                    name: child.name().to_string(),
                });
            }
        }
        Ok(Self { name, children })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Descriptor] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Descriptor> {
        self.children.iter().find(|c| c.name() == name)
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// One element descriptor repeated any number of times.
///
/// With a count correlation the sequence reads exactly the linked number of
/// elements. Without one it reads elements speculatively until one fails.
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    element: Descriptor,
    multiplicity: Option<Multiplicity>,
    count: Option<Correlation<usize>>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, element: Descriptor) -> Result<Self, ConfigError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            name,
            element,
            multiplicity: None,
            count: None,
        })
    }

    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = Some(multiplicity);
        self
    }

    /// Take the element count from an observed field.
    pub fn counted_by(mut self, count: Correlation<usize>) -> Self {
        self.count = Some(count);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> &Descriptor {
        &self.element
    }

    pub fn multiplicity(&self) -> Option<Multiplicity> {
        self.multiplicity
    }

    pub fn count(&self) -> Option<&Correlation<usize>> {
        self.count.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Optional
// ---------------------------------------------------------------------------

/// A target that is either present once or absent.
#[derive(Debug, Clone)]
pub struct Optional {
    name: String,
    target: Descriptor,
    flag: Option<Correlation<bool>>,
}

impl Optional {
    pub fn new(name: impl Into<String>, target: Descriptor) -> Result<Self, ConfigError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            name,
            target,
            flag: None,
        })
    }

    /// Take presence from an observed flag field.
    pub fn flagged_by(mut self, flag: Correlation<bool>) -> Self {
        self.flag = Some(flag);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Descriptor {
        &self.target
    }

    pub fn flag(&self) -> Option<&Correlation<bool>> {
        self.flag.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Delimiter wrapper
// ---------------------------------------------------------------------------

/// An item followed by a terminating character, a newline unless set.
#[derive(Debug, Clone)]
pub struct DelimiterWrapper {
    inner: Descriptor,
    delimiter: char,
}

impl DelimiterWrapper {
    pub fn new(inner: Descriptor) -> Self {
        Self {
            inner,
            delimiter: '\n',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn inner(&self) -> &Descriptor {
        &self.inner
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ConstantField, FixedField};

    fn fixed(name: &str, width: usize) -> Descriptor {
        FixedField::new(name, width).unwrap().into()
    }

    #[test]
    fn test_multiplicity_is_symmetric() {
        let a = Multiplicity::new(1, 3).unwrap();
        let b = Multiplicity::new(3, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.min(), 1);
        assert_eq!(a.max(), 3);
        assert_eq!(a.to_string(), "1..3");
        assert!(a.contains(3));
        assert!(!a.contains(0));
    }

    #[test]
    fn test_multiplicity_needs_positive_max() {
        assert!(matches!(
            Multiplicity::new(0, 0),
            Err(ConfigError::InvalidMultiplicity { .. })
        ));
        assert!(Multiplicity::new(0, 1).unwrap().contains(0));
    }

    #[test]
    fn test_composite_rejects_duplicate_names() {
        let err = Composite::new("rec", vec![fixed("a", 1), fixed("a", 2)]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateChild { .. }));
    }

    #[test]
    fn test_composite_rejects_repeated_instance() {
        let a = fixed("a", 1);
        let err = Composite::new("rec", vec![a.clone(), a]).unwrap_err();
        assert!(matches!(err, ConfigError::RepeatedDescriptor { .. }));
    }

    #[test]
    fn test_composite_child_lookup() {
        let tag: Descriptor = ConstantField::new("tag", "T").unwrap().into();
        let rec = Composite::new("rec", vec![tag.clone(), fixed("b", 2)]).unwrap();
        assert_eq!(rec.child("tag"), Some(&tag));
        assert!(rec.child("zzz").is_none());
        assert_eq!(rec.children().len(), 2);
    }

    #[test]
    fn test_structures_need_names() {
        assert!(matches!(
            Sequence::new("", fixed("a", 1)),
            Err(ConfigError::EmptyName)
        ));
        assert!(matches!(
            Optional::new("", fixed("a", 1)),
            Err(ConfigError::EmptyName)
        ));
        assert_eq!(DelimiterWrapper::new(fixed("a", 1)).delimiter(), '\n');
    }
}
