/* ************************************************************************ **
** This file is part of distla and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
** ************************************************************************ */

use distla_dist::{Error, Result};

/// Tuning parameters shared by the blocked algorithms.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AlgoConfig {
    /// Width of the panels.
    #[serde(default = "self::defaults::blocksize")]
    pub blocksize: usize,
}

impl Default for AlgoConfig {
    fn default() -> Self { AlgoConfig { blocksize: defaults::blocksize() } }
}

impl AlgoConfig {
    pub fn with_blocksize(blocksize: usize) -> Self { AlgoConfig { blocksize } }

    /// Fails for settings no algorithm can work with.
    pub fn validate(&self, op: &'static str) -> Result<()> {
        if self.blocksize == 0 {
            return Err(Error::InvalidArgument { op, detail: "blocksize must be positive".into() });
        }
        Ok(())
    }
}

mod defaults {
    pub(crate) fn blocksize() -> usize { 128 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml() {
        let config: AlgoConfig = serde_yaml::from_str("blocksize: 32").unwrap();
        assert_eq!(config, AlgoConfig::with_blocksize(32));

        let config: AlgoConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AlgoConfig::default());
        assert_eq!(config.blocksize, 128);

        assert!(serde_yaml::from_str::<AlgoConfig>("block-size: 32").is_err());
    }

    #[test]
    fn zero_blocksize() {
        assert!(AlgoConfig::with_blocksize(0).validate("test").is_err());
        assert!(AlgoConfig::default().validate("test").is_ok());
    }
}
