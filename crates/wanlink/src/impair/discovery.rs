//! Interface discovery inside a target.
//!
//! Runs `ip -o link show` and `ip -o -4 addr show` through an executor and
//! merges both into a sorted list of [`InterfaceInfo`]. Loopback is
//! skipped and names are canonicalized (`eth0@if23` becomes `eth0`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::preceded;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use super::error::{Error, Result};
use super::executor::RemoteExecutor;
use super::stats::PResult;
use crate::util::ifname;

/// One-line link listing.
pub const LINK_COMMAND: &str = "ip -o link show";
/// One-line IPv4 address listing.
pub const ADDR_COMMAND: &str = "ip -o -4 addr show";

/// A discovered interface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Canonical interface name.
    pub iface: String,
    /// First IPv4 address in CIDR form.
    pub ipv4: Option<String>,
    /// Hardware address, for ethernet-like links.
    pub mac: Option<String>,
}

impl InterfaceInfo {
    pub fn new(iface: impl AsRef<str>) -> Self {
        Self {
            iface: ifname::canonicalize(iface.as_ref()).to_string(),
            ipv4: None,
            mac: None,
        }
    }
}

/// List the non-loopback interfaces of `target`.
///
/// A failing link listing is an error; a failing address listing only
/// leaves `ipv4` empty.
pub async fn interfaces<E: RemoteExecutor>(exec: &E, target: &str) -> Result<Vec<InterfaceInfo>> {
    let links = exec.execute(target, LINK_COMMAND).await?;
    if !links.success() {
        return Err(Error::Execution {
            target: target.to_string(),
            command: LINK_COMMAND.to_string(),
            status: Some(links.status),
            output: links.output,
        });
    }

    let addrs = match exec.execute(target, ADDR_COMMAND).await {
        Ok(out) if out.success() => out.output,
        Ok(out) => {
            tracing::debug!("{}: address listing failed ({})", target, out.status);
            String::new()
        }
        Err(e) if e.is_not_found() => return Err(e),
        Err(e) => {
            tracing::debug!("{}: address listing failed: {}", target, e);
            String::new()
        }
    };

    Ok(merge(&links.output, &addrs))
}

/// Combine link and address listings.
pub fn merge(links: &str, addrs: &str) -> Vec<InterfaceInfo> {
    let addrs = parse_addrs(addrs);

    let mut by_name: BTreeMap<String, InterfaceInfo> = BTreeMap::new();
    for (name, mac) in parse_links(links) {
        let entry = by_name
            .entry(name.clone())
            .or_insert_with(|| InterfaceInfo::new(&name));
        if entry.mac.is_none() {
            entry.mac = mac;
        }
    }

    for info in by_name.values_mut() {
        info.ipv4 = addrs.get(&info.iface).cloned();
    }

    by_name.into_values().collect()
}

/// Parse `ip -o link show` into `(canonical name, mac)` pairs, loopback
/// excluded.
pub fn parse_links(text: &str) -> Vec<(String, Option<String>)> {
    text.lines()
        .filter_map(|line| {
            let mut input = line;
            let name = link_name(&mut input).ok()?;
            let name = ifname::canonicalize(name);
            if name.is_empty() || name == "lo" {
                return None;
            }
            Some((name.to_string(), ether_address(line)))
        })
        .collect()
}

/// Parse `ip -o -4 addr show` into canonical name -> first IPv4 CIDR.
pub fn parse_addrs(text: &str) -> BTreeMap<String, String> {
    let mut addrs = BTreeMap::new();
    for line in text.lines() {
        let mut input = line;
        if let Ok((name, cidr)) = inet_entry(&mut input) {
            let name = ifname::canonicalize(name);
            if name != "lo" {
                addrs.entry(name.to_string()).or_insert_with(|| cidr.to_string());
            }
        }
    }
    addrs
}

/// `23: eth0@if24: <...` -> `eth0@if24`
fn link_name<'a>(input: &mut &'a str) -> PResult<&'a str> {
    (space0, digit1, ":", space1).parse_next(input)?;
    let name = take_till(1.., |c: char| c == ':' || c.is_whitespace()).parse_next(input)?;
    ":".parse_next(input)?;
    Ok(name)
}

/// `2: eth0    inet 172.17.0.2/16 brd ...` -> (`eth0`, `172.17.0.2/16`)
fn inet_entry<'a>(input: &mut &'a str) -> PResult<(&'a str, &'a str)> {
    (space0, digit1, ":", space1).parse_next(input)?;
    let name = take_till(1.., char::is_whitespace).parse_next(input)?;
    let cidr = preceded((space1, "inet", space1), take_till(1.., char::is_whitespace))
        .parse_next(input)?;
    Ok((name, cidr))
}

fn ether_address(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("link/ether")?;
    let mut input = rest;
    let mac: PResult<&str> = preceded(
        space1,
        take_while(1.., |c: char| c.is_ascii_hexdigit() || c == ':'),
    )
    .parse_next(&mut input);
    mac.ok().map(str::to_ascii_lowercase)
}
