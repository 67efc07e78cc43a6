// spcc - a C11 preprocessor and translation front end.
// Copyright (C) 2026 Alex Bock
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Replaces the C original's process-wide `options::state` global with a
//! single immutable value threaded through the driver.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CharSignedness {
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorMode {
    Auto,
    Disabled,
}

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("--bits-per-byte must be at least 8, got {0}")]
    BitsPerByteTooSmall(u32),
    #[error("--{ty}-bytes={bytes} cannot represent the C-mandated maximum ({min_bits} bits needed)")]
    IntegerWidthTooSmall {
        ty: &'static str,
        bytes: u32,
        min_bits: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub bits_per_byte: u32,
    pub short_bytes: u32,
    pub int_bytes: u32,
    pub long_bytes: u32,
    pub long_long_bytes: u32,
    pub char_signed: CharSignedness,
    pub color: ColorMode,
    pub include_dirs: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bits_per_byte: 8,
            short_bytes: 2,
            int_bytes: 4,
            long_bytes: 8,
            long_long_bytes: 8,
            char_signed: CharSignedness::Signed,
            color: ColorMode::Auto,
            include_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// The C standard's mandated minimum maxima for unsigned integer types:
    /// `short`/`int` must represent at least 65535, `long` at least
    /// 4294967295, `long long` at least 18446744073709551615.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bits_per_byte < 8 {
            return Err(ConfigError::BitsPerByteTooSmall(self.bits_per_byte));
        }
        let checks: [(&'static str, u32, u32); 3] = [
            ("short", self.short_bytes, 16),
            ("long", self.long_bytes, 32),
            ("long-long", self.long_long_bytes, 64),
        ];
        for (ty, bytes, min_bits) in checks {
            if bytes * self.bits_per_byte < min_bits {
                return Err(ConfigError::IntegerWidthTooSmall {
                    ty,
                    bytes,
                    min_bits,
                });
            }
        }
        if self.int_bytes * self.bits_per_byte < 16 {
            return Err(ConfigError::IntegerWidthTooSmall {
                ty: "int",
                bytes: self.int_bytes,
                min_bits: 16,
            });
        }
        Ok(())
    }

    pub fn build(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().build().is_ok());
    }

    #[test]
    fn undersized_short_is_rejected() {
        let cfg = Config {
            short_bytes: 1,
            ..Config::default()
        };
        assert!(cfg.build().is_err());
    }

    #[test]
    fn undersized_bits_per_byte_is_rejected() {
        let cfg = Config {
            bits_per_byte: 7,
            ..Config::default()
        };
        assert!(cfg.build().is_err());
    }
}
