//! Static resource descriptor catalogue built from a target description.

use crate::{
    ConfigError, ConfigHeader, ConfigId, Descriptor, KeyDescriptor, KeyType, MemoryDescriptor,
    MiscDescriptor, ResourceClass, TargetConfig, ValError, ValResult,
};

/// Immutable catalogue answering `get_config` and key lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorStore {
    memory: Vec<MemoryDescriptor>,
    misc: Vec<MiscDescriptor>,
    keys: Vec<KeyDescriptor>,
}

impl DescriptorStore {
    /// Builds the catalogue, numbering instances per class in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`TargetConfig::validate`].
    pub fn from_config(config: &TargetConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut memory = Vec::with_capacity(config.memory.len());
        for region in &config.memory {
            let class = ResourceClass::Memory(region.kind);
            let instance_count =
                count_u32(config.memory.iter().filter(|r| r.kind == region.kind).count())?;
            let instance = memory
                .iter()
                .filter(|desc: &&MemoryDescriptor| desc.header.id.class == class)
                .count();
            memory.push(MemoryDescriptor {
                header: ConfigHeader {
                    id: ConfigId::new(class, instance_u16(instance)?),
                    instance_count,
                },
                start: region.start,
                end: region.end,
                attribute: region.attribute,
            });
        }

        let counter_count = count_u32(config.version_counters.len())?;
        let mut misc = Vec::with_capacity(config.version_counters.len());
        for (instance, counter) in config.version_counters.iter().enumerate() {
            misc.push(MiscDescriptor {
                header: ConfigHeader {
                    id: ConfigId::new(ResourceClass::VERSION_COUNTER, instance_u16(instance)?),
                    instance_count: counter_count,
                },
                fw_ver_type: counter.class,
                fw_ver_cnt_max: counter.max,
            });
        }

        let mut keys: Vec<KeyDescriptor> = Vec::with_capacity(config.keys.len());
        for key in &config.keys {
            let instance = keys.iter().filter(|k| k.key == key.key).count();
            keys.push(KeyDescriptor {
                key: key.key,
                instance: count_u32(instance)?,
                addr: key.addr,
                size: count_u32(key.material.len())?,
                state: key.state,
            });
        }

        Ok(Self { memory, misc, keys })
    }

    /// Looks up one descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ValError::NotFound`] when the target declares no such
    /// instance.
    pub fn get(&self, id: ConfigId) -> ValResult<Descriptor> {
        match id.class {
            ResourceClass::Memory(_) => self
                .memory
                .iter()
                .find(|desc| desc.header.id == id)
                .copied()
                .map(Descriptor::Memory),
            ResourceClass::Misc(_) => self
                .misc
                .iter()
                .find(|desc| desc.header.id == id)
                .copied()
                .map(Descriptor::Misc),
        }
        .ok_or(ValError::NotFound)
    }

    /// Looks up a key resource.
    ///
    /// # Errors
    ///
    /// Returns [`ValError::NotFound`] when the key instance is not declared.
    pub fn key(&self, key: KeyType, instance: u32) -> ValResult<KeyDescriptor> {
        self.keys
            .iter()
            .find(|desc| desc.key == key && desc.instance == instance)
            .copied()
            .ok_or(ValError::NotFound)
    }

    /// All memory descriptors in declaration order.
    pub fn memory(&self) -> impl Iterator<Item = &MemoryDescriptor> {
        self.memory.iter()
    }

    /// All version counter descriptors in instance order.
    pub fn counters(&self) -> impl Iterator<Item = &MiscDescriptor> {
        self.misc.iter()
    }

    /// All key descriptors in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &KeyDescriptor> {
        self.keys.iter()
    }

    /// Number of instances declared for `class`.
    #[must_use]
    pub fn instance_count(&self, class: ResourceClass) -> usize {
        match class {
            ResourceClass::Memory(_) => self
                .memory
                .iter()
                .filter(|desc| desc.header.id.class == class)
                .count(),
            ResourceClass::Misc(_) => self.misc.len(),
        }
    }
}

fn count_u32(count: usize) -> Result<u32, ConfigError> {
    u32::try_from(count).map_err(|_| ConfigError::TooManyInstances)
}

fn instance_u16(instance: usize) -> Result<u16, ConfigError> {
    u16::try_from(instance).map_err(|_| ConfigError::TooManyInstances)
}

#[cfg(test)]
mod tests {
    use super::DescriptorStore;
    use crate::{
        ConfigId, Descriptor, FwVersionClass, KeyType, MemAttribute, MemoryType, ResourceClass,
        TargetConfig, ValError,
    };

    fn store() -> DescriptorStore {
        DescriptorStore::from_config(&TargetConfig::default()).expect("reference target")
    }

    #[test]
    fn instances_are_numbered_per_type() {
        let store = store();
        let sram = ResourceClass::Memory(MemoryType::Sram);
        let nvram = ResourceClass::Memory(MemoryType::Nvram);

        let Ok(Descriptor::Memory(third)) = store.get(ConfigId::new(sram, 2)) else {
            panic!("expected sram instance 2");
        };
        assert_eq!(third.attribute, MemAttribute::Unused);
        assert_eq!(third.header.instance_count, 4);

        let Ok(Descriptor::Memory(first_nv)) = store.get(ConfigId::new(nvram, 0)) else {
            panic!("expected nvram instance 0");
        };
        assert_eq!(first_nv.header.instance_count, 1);
        assert_eq!(store.instance_count(sram), 4);
    }

    #[test]
    fn out_of_range_instance_is_not_found() {
        let store = store();
        let sram = ResourceClass::Memory(MemoryType::Sram);
        assert_eq!(store.get(ConfigId::new(sram, 4)), Err(ValError::NotFound));
        assert_eq!(
            store.get(ConfigId::new(ResourceClass::Memory(MemoryType::Flash), 0)),
            Err(ValError::NotFound)
        );
    }

    #[test]
    fn counters_and_keys_are_catalogued() {
        let store = store();
        let Ok(Descriptor::Misc(counter)) =
            store.get(ConfigId::new(ResourceClass::VERSION_COUNTER, 1))
        else {
            panic!("expected counter instance 1");
        };
        assert_eq!(counter.fw_ver_type, FwVersionClass::Trusted);
        assert_eq!(counter.header.instance_count, 2);

        let huk = store.key(KeyType::Huk, 0).expect("huk declared");
        assert_eq!(huk.size, 8);
        assert_eq!(store.key(KeyType::Huk, 1), Err(ValError::NotFound));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = TargetConfig::default();
        config.memory.clear();
        assert!(DescriptorStore::from_config(&config).is_err());
    }
}
