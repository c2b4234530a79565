//! Network interface resources
//!
//! An interface is a named selection rule for a network address. The
//! selection itself happens elsewhere; the model only stores and checks the
//! criteria.

use crate::attributes::{validate_parameters, AttributeDefinition};
use crate::context::OperationContext;
use crate::error::{OperationFailure, Result};
use crate::handler::{HandlerOutcome, OperationDescription, OperationHandler};
use crate::handlers::{commit_add, prepare_add, requested_implicit, AddMode};
use keel_types::{names, ModelType, ModelValue, Operation};
use std::collections::BTreeMap;
use std::net::IpAddr;

pub const ANY_ADDRESS: &str = "any-address";
pub const ANY_IPV4_ADDRESS: &str = "any-ipv4-address";
pub const ANY_IPV6_ADDRESS: &str = "any-ipv6-address";
pub const LOOPBACK: &str = "loopback";
pub const INET_ADDRESS: &str = "inet-address";
pub const NIC: &str = "nic";
pub const PUBLIC_ADDRESS: &str = "public-address";
pub const SITE_LOCAL_ADDRESS: &str = "site-local-address";
pub const LINK_LOCAL_ADDRESS: &str = "link-local-address";
pub const UP: &str = "up";
pub const VIRTUAL: &str = "virtual";

/// One address selection rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceCriterion {
    AnyAddress,
    AnyIpv4Address,
    AnyIpv6Address,
    Loopback,
    InetAddress(IpAddr),
    Nic(String),
    PublicAddress,
    SiteLocalAddress,
    LinkLocalAddress,
    Up,
    Virtual,
}

impl InterfaceCriterion {
    /// The `any-*` criteria, which must stand alone
    fn wildcard_key(&self) -> Option<&'static str> {
        match self {
            Self::AnyAddress => Some(ANY_ADDRESS),
            Self::AnyIpv4Address => Some(ANY_IPV4_ADDRESS),
            Self::AnyIpv6Address => Some(ANY_IPV6_ADDRESS),
            _ => None,
        }
    }
}

/// Parsed `criteria` parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceCriteria {
    criteria: Vec<InterfaceCriterion>,
}

impl InterfaceCriteria {
    /// Parse a criteria object.
    ///
    /// `specified` interfaces must carry at least one criterion; named ones
    /// may leave the selection to a later `specified` overwrite. Flag criteria
    /// are enabled with `true` and ignored when `false`.
    pub fn parse(value: Option<&ModelValue>, specified: bool) -> std::result::Result<Self, String> {
        let entries = match value {
            None => BTreeMap::new(),
            Some(ModelValue::Object(entries)) => entries.clone(),
            Some(other) => {
                return Err(format!(
                    "'{}' must be an object but was {}",
                    names::CRITERIA,
                    other.model_type()
                ))
            }
        };

        let mut criteria = Vec::new();
        for (key, value) in &entries {
            if let Some(criterion) = parse_criterion(key, value)? {
                criteria.push(criterion);
            }
        }

        if criteria.is_empty() {
            return if specified {
                Err("No interface criteria was provided".to_string())
            } else {
                Ok(Self::default())
            };
        }
        if criteria.len() > 1 {
            if let Some(key) = criteria.iter().find_map(InterfaceCriterion::wildcard_key) {
                return Err(format!("'{}' cannot be combined with other criteria", key));
            }
        }
        Ok(Self { criteria })
    }

    pub fn criteria(&self) -> &[InterfaceCriterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

fn parse_criterion(
    key: &str,
    value: &ModelValue,
) -> std::result::Result<Option<InterfaceCriterion>, String> {
    let flag = |criterion: InterfaceCriterion| match value {
        ModelValue::Bool(true) => Ok(Some(criterion)),
        ModelValue::Bool(false) | ModelValue::Undefined => Ok(None),
        other => Err(format!("'{}' must be a boolean but was {}", key, other.model_type())),
    };
    match key {
        ANY_ADDRESS => flag(InterfaceCriterion::AnyAddress),
        ANY_IPV4_ADDRESS => flag(InterfaceCriterion::AnyIpv4Address),
        ANY_IPV6_ADDRESS => flag(InterfaceCriterion::AnyIpv6Address),
        LOOPBACK => flag(InterfaceCriterion::Loopback),
        PUBLIC_ADDRESS => flag(InterfaceCriterion::PublicAddress),
        SITE_LOCAL_ADDRESS => flag(InterfaceCriterion::SiteLocalAddress),
        LINK_LOCAL_ADDRESS => flag(InterfaceCriterion::LinkLocalAddress),
        UP => flag(InterfaceCriterion::Up),
        VIRTUAL => flag(InterfaceCriterion::Virtual),
        INET_ADDRESS => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("'{}' must be a string", key))?;
            text.parse::<IpAddr>()
                .map(|ip| Some(InterfaceCriterion::InetAddress(ip)))
                .map_err(|_| format!("'{}' is not a valid IP address: {}", key, text))
        }
        NIC => value
            .as_str()
            .map(|nic| Some(InterfaceCriterion::Nic(nic.to_string())))
            .ok_or_else(|| format!("'{}' must be a string", key)),
        unknown => Err(format!("Unknown interface criteria '{}'", unknown)),
    }
}

/// `add` for `interface` resources
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceAddHandler {
    mode: AddMode,
}

impl InterfaceAddHandler {
    /// Domain-level interface declaration; criteria optional
    pub fn named() -> Self {
        Self {
            mode: AddMode::Named,
        }
    }

    /// Host or server level interface; criteria required, may replace a default
    pub fn specified() -> Self {
        Self {
            mode: AddMode::Specified,
        }
    }

    fn parameters() -> Vec<AttributeDefinition> {
        vec![
            AttributeDefinition::new(names::NAME, ModelType::String)
                .describe("Ignored; the name is taken from the address"),
            AttributeDefinition::new(names::CRITERIA, ModelType::Object)
                .describe("Address selection criteria"),
        ]
    }
}

impl OperationHandler for InterfaceAddHandler {
    fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        operation: &Operation,
    ) -> Result<HandlerOutcome> {
        let overwritten = prepare_add(ctx, self.mode)?;
        validate_parameters(&Self::parameters(), &operation.params, false)
            .map_err(|violations| OperationFailure::validation(ctx.address(), violations))?;

        let criteria = operation.param(names::CRITERIA);
        InterfaceCriteria::parse(criteria, self.mode == AddMode::Specified)
            .map_err(|message| OperationFailure::invalid(ctx.address(), message))?;

        let name = ctx.local_name().unwrap_or_default().to_string();
        let mut attributes = BTreeMap::new();
        attributes.insert(names::NAME.to_string(), ModelValue::from(name));
        if let Some(criteria) = criteria {
            attributes.insert(names::CRITERIA.to_string(), criteria.clone());
        }
        commit_add(ctx, attributes, requested_implicit(operation), overwritten)
    }

    fn describe(&self) -> OperationDescription {
        let description = match self.mode {
            AddMode::Named => "Declare a named interface",
            AddMode::Specified => "Declare an interface with its address selection criteria",
        };
        OperationDescription::new(names::ADD, description).with_parameters(Self::parameters())
    }
}

/// The `criteria` value of a loopback-only interface
pub fn loopback_criteria() -> ModelValue {
    ModelValue::object().with(LOOPBACK, true)
}
