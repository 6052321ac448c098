/*!
    probe registration and finalization

    probes are registered on an explicit [Registry] while the design is built. Finalizing the registry filters probes by group, freezes their order into the catalog and builds the [Scope] serving them.
*/

use alloc::{vec::Vec, string::String};
use log::*;

use crate::{
    probe::{self, Insert, InsertInfo, InstantTap, SingleTap, BufferTap},
    config::{Config, ConfigError},
    engine::{Scope, EngineConfig},
    };


/// probes registered so far, in registration order
#[derive(Debug, Default)]
pub struct Registry {
    filter: Option<Vec<String>>,
    inserts: Vec<(InsertInfo, Insert)>,
}
impl Registry {
    pub fn new() -> Self {Self::default()}

    /// only keep probes of the given groups when finalizing
    pub fn set_filter<S: Into<String>>(&mut self, groups: impl IntoIterator<Item=S>) {
        self.filter = Some(groups.into_iter().map(Into::into).collect());
    }
    /// whether a probe passes the group filter
    pub fn is_enabled(&self, info: &InsertInfo) -> bool {
        match &self.filter {
            None => true,
            Some(groups) => groups.iter().any(|group| *group == info.group),
        }
    }
    /// append a probe, duplicates are legal and stay distinct
    pub fn register(&mut self, info: InsertInfo, insert: Insert) {
        debug!("register probe {}/{}", info.group, info.name);
        self.inserts.push((info, insert));
    }

    /// register a probe continuously following a value of any domain
    pub fn instant(&mut self, group: &str, name: &str, width: u32) -> InstantTap {
        let (insert, tap) = probe::instant(width);
        self.register(InsertInfo::new(group, name, width, 1), Insert::Instant(insert));
        tap
    }
    /// register a probe capturing one value on demand
    pub fn single(&mut self, group: &str, name: &str, width: u32) -> SingleTap {
        let (insert, tap) = probe::single(width);
        self.register(InsertInfo::new(group, name, width, 1), Insert::Single(insert));
        tap
    }
    /// register a probe recording `depth` successive values once triggered
    pub fn buffer(&mut self, group: &str, name: &str, width: u32, depth: u32) -> BufferTap {
        let info = InsertInfo::new(group, name, width, depth);
        let (insert, tap) = probe::buffer(width, depth as usize);
        self.register(info, Insert::Buffer(insert));
        tap
    }

    /// probes that would be kept by [Self::finalize]
    pub fn active(&self) -> impl Iterator<Item=&InsertInfo> {
        self.inserts.iter()
            .map(|(info, _)| info)
            .filter(|info| self.is_enabled(info))
    }

    /**
        freeze the catalog and build the scope serving it

        returns `None` if no probe is active, in which case there is nothing to serve and no engine is built
    */
    pub fn finalize(mut self, config: EngineConfig) -> Result<Option<Scope>, ConfigError> {
        let inserts = core::mem::take(&mut self.inserts);
        let catalog: Catalog = inserts.into_iter()
            .filter(|(info, _)| self.is_enabled(info))
            .collect();
        if catalog.is_empty() {
            info!("no active probe, scope is elided");
            return Ok(None);
        }
        if catalog.len() > 256 {
            warn!("{} probes active, only the first 256 can be selected", catalog.len());
        }
        info!("{} probes in catalog", catalog.len());
        Ok(Some(Scope::new(catalog, config)?))
    }
}


/// finalized probes, the position of a probe is its selector on the wire
#[derive(Debug, Default)]
pub struct Catalog {
    infos: Vec<InsertInfo>,
    inserts: Vec<Insert>,
}
impl Catalog {
    pub fn len(&self) -> usize {self.inserts.len()}
    pub fn is_empty(&self) -> bool {self.inserts.is_empty()}
    pub fn infos(&self) -> &[InsertInfo] {&self.infos}
    pub fn get(&self, index: usize) -> Option<&Insert> {self.inserts.get(index)}
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Insert> {self.inserts.get_mut(index)}
    pub fn iter_mut(&mut self) -> impl Iterator<Item=&mut Insert> {self.inserts.iter_mut()}
    /// configuration advertised to the host for this catalog
    pub fn config(&self) -> Config {
        Config::from_infos(&self.infos)
    }
}
impl FromIterator<(InsertInfo, Insert)> for Catalog {
    fn from_iter<I: IntoIterator<Item=(InsertInfo, Insert)>>(iter: I) -> Self {
        let (infos, inserts) = iter.into_iter().unzip();
        Self {infos, inserts}
    }
}
