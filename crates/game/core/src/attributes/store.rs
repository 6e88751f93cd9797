//! Attribute storage backed by an ordered map.

use alloc::collections::BTreeMap;

use super::{Attr, AttrId, AttrValue};

/// Per-entity attribute collection.
///
/// Missing keys read as zero/false, matching how gameplay formulas treat
/// absent bonuses. Writing an exact zero/false removes the key so the
/// store never accumulates dead entries.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttrStore {
    map: BTreeMap<AttrId, AttrValue>,
}

impl AttrStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get(&self, id: impl Into<AttrId>) -> Option<AttrValue> {
        self.map.get(&id.into()).copied()
    }

    pub fn f32(&self, attr: Attr) -> f32 {
        self.f32_p(attr, 0)
    }

    pub fn f32_p(&self, attr: Attr, param: u32) -> f32 {
        self.map.get(&AttrId::new(attr, param)).map_or(0.0, |v| v.as_f32())
    }

    pub fn i64(&self, attr: Attr) -> i64 {
        self.i64_p(attr, 0)
    }

    pub fn i64_p(&self, attr: Attr, param: u32) -> i64 {
        self.map.get(&AttrId::new(attr, param)).map_or(0, |v| v.as_i64())
    }

    pub fn flag(&self, attr: Attr) -> bool {
        self.flag_p(attr, 0)
    }

    pub fn flag_p(&self, attr: Attr, param: u32) -> bool {
        self.map.get(&AttrId::new(attr, param)).is_some_and(|v| v.as_bool())
    }

    pub fn has(&self, attr: Attr, param: u32) -> bool {
        self.map.contains_key(&AttrId::new(attr, param))
    }

    /// All `(param, value)` pairs stored under one attribute family, in
    /// ascending param order.
    pub fn family(&self, attr: Attr) -> impl Iterator<Item = (u32, AttrValue)> + '_ {
        self.map
            .range(AttrId::new(attr, 0)..=AttrId::new(attr, u32::MAX))
            .map(|(id, v)| (id.param, *v))
    }

    /// Sum of every float value stored under one attribute family.
    pub fn family_sum(&self, attr: Attr) -> f32 {
        self.family(attr).map(|(_, v)| v.as_f32()).sum()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn set_f32(&mut self, attr: Attr, value: f32) {
        self.set_f32_p(attr, 0, value);
    }

    pub fn set_f32_p(&mut self, attr: Attr, param: u32, value: f32) {
        let id = AttrId::new(attr, param);
        if value == 0.0 {
            self.map.remove(&id);
        } else {
            self.map.insert(id, AttrValue::Float(value));
        }
    }

    pub fn set_i64(&mut self, attr: Attr, value: i64) {
        self.set_i64_p(attr, 0, value);
    }

    pub fn set_i64_p(&mut self, attr: Attr, param: u32, value: i64) {
        let id = AttrId::new(attr, param);
        if value == 0 {
            self.map.remove(&id);
        } else {
            self.map.insert(id, AttrValue::Int(value));
        }
    }

    pub fn set_flag(&mut self, attr: Attr, value: bool) {
        self.set_flag_p(attr, 0, value);
    }

    pub fn set_flag_p(&mut self, attr: Attr, param: u32, value: bool) {
        let id = AttrId::new(attr, param);
        if value {
            self.map.insert(id, AttrValue::Flag(true));
        } else {
            self.map.remove(&id);
        }
    }

    pub fn adjust_f32(&mut self, attr: Attr, delta: f32) {
        self.adjust_f32_p(attr, 0, delta);
    }

    pub fn adjust_f32_p(&mut self, attr: Attr, param: u32, delta: f32) {
        let next = self.f32_p(attr, param) + delta;
        self.set_f32_p(attr, param, next);
    }

    pub fn adjust_i64_p(&mut self, attr: Attr, param: u32, delta: i64) {
        let next = self.i64_p(attr, param) + delta;
        self.set_i64_p(attr, param, next);
    }

    pub fn remove(&mut self, attr: Attr, param: u32) -> Option<AttrValue> {
        self.map.remove(&AttrId::new(attr, param))
    }

    /// Remove every entry under one attribute family. Returns how many
    /// entries were dropped.
    pub fn remove_family(&mut self, attr: Attr) -> usize {
        let keys: alloc::vec::Vec<AttrId> = self
            .map
            .range(AttrId::new(attr, 0)..=AttrId::new(attr, u32::MAX))
            .map(|(id, _)| *id)
            .collect();
        for key in &keys {
            self.map.remove(key);
        }
        keys.len()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
