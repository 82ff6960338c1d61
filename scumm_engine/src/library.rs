use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::scheduler::ScriptLocation;

/// Verb slot used when an object has no entry for the requested verb.
pub const DEFAULT_VERB: u8 = 0xFF;

/// Verb code attached to a room or inventory object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCode {
    pub location: ScriptLocation,
    pub code: Vec<u8>,
    /// `(verb, offset)` entry points into `code`.
    pub verbs: Vec<(u8, usize)>,
}

impl ObjectCode {
    pub fn entry_point(&self, verb: u8) -> Option<usize> {
        entry_point(&self.verbs, verb)
    }
}

fn entry_point(verbs: &[(u8, usize)], verb: u8) -> Option<usize> {
    let find = |wanted: u8| {
        verbs
            .iter()
            .find(|(verb, _)| *verb == wanted)
            .map(|(_, offset)| *offset)
    };
    find(verb).or_else(|| find(DEFAULT_VERB))
}

#[derive(Debug, Clone)]
struct LoadedObject {
    location: ScriptLocation,
    code: Rc<[u8]>,
    verbs: Vec<(u8, usize)>,
}

/// Bytecode for every script the engine can start, keyed by script number.
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    globals: BTreeMap<u16, Rc<[u8]>>,
    locals: BTreeMap<u16, Rc<[u8]>>,
    objects: BTreeMap<u16, LoadedObject>,
}

impl ScriptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_global(&mut self, number: u16, code: Vec<u8>) {
        self.globals.insert(number, Rc::from(code));
    }

    pub fn insert_local(&mut self, number: u16, code: Vec<u8>) {
        self.locals.insert(number, Rc::from(code));
    }

    pub fn insert_object(&mut self, object: u16, code: ObjectCode) {
        let loaded = LoadedObject {
            location: code.location,
            code: Rc::from(code.code),
            verbs: code.verbs,
        };
        self.objects.insert(object, loaded);
    }

    /// Code executed by a slot holding `number` at `location`.
    pub fn code_for(&self, number: u16, location: ScriptLocation) -> Option<Rc<[u8]>> {
        match location {
            ScriptLocation::Global => self.globals.get(&number).cloned(),
            ScriptLocation::Local => self.locals.get(&number).cloned(),
            ScriptLocation::Room | ScriptLocation::Inventory | ScriptLocation::FLObject => {
                self.objects.get(&number).map(|object| object.code.clone())
            }
            ScriptLocation::NotFound => None,
        }
    }

    pub fn where_is_object(&self, object: u16) -> ScriptLocation {
        self.objects
            .get(&object)
            .map(|object| object.location)
            .unwrap_or(ScriptLocation::NotFound)
    }

    pub fn object_entry(&self, object: u16, verb: u8) -> Option<usize> {
        let object = self.objects.get(&object)?;
        entry_point(&object.verbs, verb).filter(|offset| *offset < object.code.len())
    }

    pub fn len(&self) -> usize {
        self.globals.len() + self.locals.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door() -> ObjectCode {
        ObjectCode {
            location: ScriptLocation::Room,
            code: vec![0x80, 0xA0, 0x80, 0xA0],
            verbs: vec![(3, 0), (DEFAULT_VERB, 2)],
        }
    }

    #[test]
    fn verb_lookup_falls_back_to_default_entry() {
        let code = door();
        assert_eq!(code.entry_point(3), Some(0));
        assert_eq!(code.entry_point(9), Some(2));
    }

    #[test]
    fn objects_resolve_by_location() {
        let mut library = ScriptLibrary::new();
        library.insert_object(400, door());
        library.insert_global(1, vec![0xA0]);
        assert_eq!(library.where_is_object(400), ScriptLocation::Room);
        assert_eq!(library.where_is_object(401), ScriptLocation::NotFound);
        assert_eq!(library.object_entry(400, 9), Some(2));
        assert!(library.code_for(400, ScriptLocation::Room).is_some());
        assert!(library.code_for(1, ScriptLocation::Local).is_none());
        assert_eq!(library.len(), 2);
    }
}
