use crate::jvm::class_file::{Attribute, AttributeLike, Constant, ConstantsReader};
use crate::jvm::Error;
use crate::model::RawAttribute;
use crate::util::OffsetVec;
use std::collections::HashMap;

/// Attributes of one class, field, method, or code body, sorted by name
///
/// Known attributes get parsed on demand. The rest are kept in order as raw attributes.
pub struct Attributes<'a> {
    known: HashMap<&'a str, Vec<&'a Attribute>>,
    pub unknown: Vec<RawAttribute>,
}

impl<'a> Attributes<'a> {
    pub fn new(
        constants: &'a OffsetVec<Constant>,
        attributes: &'a [Attribute],
        known_names: &[&str],
    ) -> Result<Attributes<'a>, Error> {
        let mut known: HashMap<&'a str, Vec<&'a Attribute>> = HashMap::new();
        let mut unknown = vec![];
        for attribute in attributes {
            let name = constants.utf8(attribute.name_index)?;
            if known_names.contains(&name) {
                known.entry(name).or_default().push(attribute);
            } else {
                unknown.push(RawAttribute {
                    name: name.to_owned(),
                    data: attribute.info.clone(),
                });
            }
        }
        Ok(Attributes { known, unknown })
    }

    /// First attribute with the right name
    pub fn get<A: AttributeLike>(&self) -> Result<Option<A>, Error> {
        match self.known.get(A::NAME).and_then(|attrs| attrs.first()) {
            None => Ok(None),
            Some(attribute) => {
                log::trace!("parsing {} attribute", A::NAME);
                attribute.parse::<A>().map(Some)
            }
        }
    }

    /// All attributes with the right name (some attributes may be repeated)
    pub fn get_all<A: AttributeLike>(&self) -> Result<Vec<A>, Error> {
        match self.known.get(A::NAME) {
            None => Ok(vec![]),
            Some(attrs) => attrs.iter().map(|attr| attr.parse::<A>()).collect(),
        }
    }
}
