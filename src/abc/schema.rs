//! Typed views over schema compounds.
//!
//! A schema is a compound property whose metadata names what its children
//! mean: `schema` holds a versioned title such as `Acme_Widget_v2`,
//! `schemaBaseType` the title of the schema it extends. [`ISchema`] checks
//! both when it is opened; [`OSchema`] writes them.

use std::marker::PhantomData;

use super::{ICompoundProperty, IObject, OCompoundProperty, OObject};
use crate::core::MetaData;
use crate::util::{Error, Result};

/// Static identity of a schema type.
pub trait SchemaTraits {
    /// Versioned title, e.g. `Acme_Widget_v2`.
    const TITLE: &'static str;
    /// Title of the base schema; empty when there is none.
    const BASE_TYPE: &'static str = "";
    /// Name of the schema compound under its object's properties.
    const DEFAULT_NAME: &'static str = ".geom";

    /// Metadata to write on the schema compound and its object.
    fn meta_data() -> MetaData {
        let mut md = MetaData::new().with(MetaData::SCHEMA_KEY, Self::TITLE);
        if !Self::BASE_TYPE.is_empty() {
            md.set(MetaData::SCHEMA_BASE_KEY, Self::BASE_TYPE);
        }
        md
    }
}

/// Split a title into its stem and the version from a `_vN` suffix.
pub fn split_title(title: &str) -> (&str, Option<u32>) {
    if let Some(pos) = title.rfind("_v") {
        if let Ok(version) = title[pos + 2..].parse() {
            return (&title[..pos], Some(version));
        }
    }
    (title, None)
}

/// How closely stored metadata must match the expected schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchemaMatching {
    /// Title (version included) and base type must match exactly; any
    /// mismatch fails the open.
    #[default]
    Strict,
    /// Any version of the same schema is accepted. Other mismatches are
    /// handled by the [`ErrorPolicy`].
    Permissive,
}

/// What a permissive open does on mismatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Fail the open.
    #[default]
    Throw,
    /// Degrade to an untyped view silently.
    QuietNoop,
    /// Degrade to an untyped view and log a warning.
    NoisyNoop,
}

fn check<S: SchemaTraits>(md: &MetaData, matching: SchemaMatching) -> Result<()> {
    let mismatch = |actual: &str| Error::SchemaMismatch {
        expected: S::TITLE.to_string(),
        actual: actual.to_string(),
    };
    let title = md.schema().unwrap_or_default();
    let base = md.schema_base().unwrap_or_default();
    match matching {
        SchemaMatching::Strict => {
            if title != S::TITLE || base != S::BASE_TYPE {
                return Err(mismatch(title));
            }
        }
        SchemaMatching::Permissive => {
            let (stem, _) = split_title(title);
            let (expected_stem, _) = split_title(S::TITLE);
            if stem != expected_stem {
                return Err(mismatch(title));
            }
            if !S::BASE_TYPE.is_empty() && split_title(base).0 != split_title(S::BASE_TYPE).0 {
                return Err(mismatch(base));
            }
        }
    }
    Ok(())
}

/// A compound checked against schema `S`.
///
/// An invalid schema still exposes its compound through
/// [`untyped`](Self::untyped); [`typed`](Self::typed) is only available
/// when the check passed.
pub struct ISchema<S: SchemaTraits> {
    compound: ICompoundProperty,
    version: Option<u32>,
    valid: bool,
    _schema: PhantomData<S>,
}

impl<S: SchemaTraits> ISchema<S> {
    pub fn new(
        compound: ICompoundProperty,
        matching: SchemaMatching,
        policy: ErrorPolicy,
    ) -> Result<Self> {
        let version = compound.getMetaData().schema().and_then(|t| split_title(t).1);
        let valid = match check::<S>(compound.getMetaData(), matching) {
            Ok(()) => true,
            Err(err) if matching == SchemaMatching::Strict => return Err(err),
            Err(err) => match policy {
                ErrorPolicy::Throw => return Err(err),
                ErrorPolicy::QuietNoop => false,
                ErrorPolicy::NoisyNoop => {
                    tracing::warn!(compound = compound.getName(), %err, "schema mismatch, using untyped view");
                    false
                }
            },
        };
        Ok(Self {
            compound,
            version,
            valid,
            _schema: PhantomData,
        })
    }

    /// Open the schema compound of `object`, named `S::DEFAULT_NAME`.
    pub fn from_object(object: &IObject, matching: SchemaMatching, policy: ErrorPolicy) -> Result<Self> {
        let compound = object.getProperties()?.compound(S::DEFAULT_NAME)?;
        Self::new(compound, matching, policy)
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Version parsed from the stored title.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn typed(&self) -> Option<&ICompoundProperty> {
        self.valid.then_some(&self.compound)
    }

    pub fn untyped(&self) -> &ICompoundProperty {
        &self.compound
    }
}

/// Writer side of a schema: a compound carrying `S`'s metadata.
pub struct OSchema<S: SchemaTraits> {
    compound: OCompoundProperty,
    _schema: PhantomData<S>,
}

impl<S: SchemaTraits> OSchema<S> {
    /// Create the schema compound under `object`. Create the object with
    /// [`SchemaTraits::meta_data`] to tag it as well.
    pub fn create(object: &OObject) -> Result<Self> {
        let compound = object
            .properties()?
            .create_compound(S::DEFAULT_NAME, S::meta_data())?;
        Ok(Self {
            compound,
            _schema: PhantomData,
        })
    }

    pub fn compound(&self) -> &OCompoundProperty {
        &self.compound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    impl SchemaTraits for Widget {
        const TITLE: &'static str = "Acme_Widget_v2";
        const BASE_TYPE: &'static str = "Acme_Base_v1";
    }

    #[test]
    fn test_split_title() {
        assert_eq!(split_title("Acme_Widget_v2"), ("Acme_Widget", Some(2)));
        assert_eq!(split_title("Plain"), ("Plain", None));
        assert_eq!(split_title("Odd_vX"), ("Odd_vX", None));
    }

    #[test]
    fn test_check() {
        let exact = Widget::meta_data();
        assert!(check::<Widget>(&exact, SchemaMatching::Strict).is_ok());

        let older = MetaData::new()
            .with("schema", "Acme_Widget_v1")
            .with("schemaBaseType", "Acme_Base_v1");
        assert!(check::<Widget>(&older, SchemaMatching::Strict).is_err());
        assert!(check::<Widget>(&older, SchemaMatching::Permissive).is_ok());

        let other = MetaData::new().with("schema", "Acme_Gadget_v2");
        assert!(check::<Widget>(&other, SchemaMatching::Permissive).is_err());
    }
}
