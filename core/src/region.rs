//! Region table: which hosts serve a given data-center region.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    /// Host for the track API (customers, events, devices, segments).
    pub fn track_host(self) -> &'static str {
        match self {
            Region::Us => "track.customer.io",
            Region::Eu => "track-eu.customer.io",
        }
    }

    /// Host for the app API (transactional messages, collections).
    pub fn api_host(self) -> &'static str {
        match self {
            Region::Us => "api.customer.io",
            Region::Eu => "api-eu.customer.io",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us" => Ok(Region::Us),
            "eu" => Ok(Region::Eu),
            other => Err(Error::UnknownRegion(other.to_string())),
        }
    }
}
