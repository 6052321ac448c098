use crate::{
    registry::Catalog,
    probe::Insert,
    command::word_bytes,
    };


/**
    route one probe of the catalog to the protocol engine

    every output is a function of the selector. Only the selected probe sees the arm input and the shared address. A selector past the end of the catalog reads as an idle probe holding a single zero byte.
*/
#[derive(Debug)]
pub struct InsertMux {
    catalog: Catalog,
    select: usize,
    address: usize,
}
impl InsertMux {
    pub fn new(catalog: Catalog) -> Self {
        Self {catalog, select: 0, address: 0}
    }
    pub fn catalog(&self) -> &Catalog {&self.catalog}

    pub fn select(&self) -> usize {self.select}
    pub fn set_select(&mut self, index: usize) {self.select = index}
    pub fn address(&self) -> usize {self.address}
    pub fn set_address(&mut self, address: usize) {self.address = address}

    fn selected(&self) -> Option<&Insert> {
        self.catalog.get(self.select)
    }
    pub fn pending(&self) -> bool {
        self.selected().is_some_and(Insert::pending)
    }
    /// word of the selected probe at the current address
    pub fn data(&self) -> u64 {
        self.selected().map_or(0, |insert| insert.data(self.address))
    }
    /// address of the last word of the selected probe
    pub fn last_address(&self) -> usize {
        self.selected().map_or(0, |insert| insert.depth() - 1)
    }
    /// index of the last byte of a word of the selected probe
    pub fn last_byte(&self) -> usize {
        self.selected().map_or(0, |insert| word_bytes(insert.width()) - 1)
    }

    /// one engine clock edge for every probe, `arm` only reaches the selected one
    pub fn tick(&mut self, arm: bool) {
        let select = self.select;
        for (index, insert) in self.catalog.iter_mut().enumerate() {
            insert.tick(arm && index == select);
        }
    }
}
