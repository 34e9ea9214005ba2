use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ConfigurationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlacklistAction {
    Stop,
    Wait(Duration),
}

type ActionCtor = fn(Option<&str>) -> Result<BlacklistAction, ConfigurationError>;

const REGISTRY: &[(&str, ActionCtor)] = &[("stop", build_stop), ("wait", build_wait)];

fn build_stop(_: Option<&str>) -> Result<BlacklistAction, ConfigurationError> {
    Ok(BlacklistAction::Stop)
}

fn build_wait(param: Option<&str>) -> Result<BlacklistAction, ConfigurationError> {
    let raw = param.ok_or_else(|| ConfigurationError::MissingParameter {
        kind: "blacklist action",
        name: "wait".to_string(),
    })?;
    let delay = crate::utils::parse_seconds(raw)
        .map_err(|e| ConfigurationError::invalid("blacklist wait", raw, e))?;
    Ok(BlacklistAction::Wait(delay))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlacklistStatus {
    codes: BTreeSet<u16>,
    action: BlacklistAction,
}

impl BlacklistStatus {
    // `codes[:action[=param]]`, e.g. `429:wait=5` or `403,503:stop`; the
    // action defaults to stop
    pub fn parse(spec: &str) -> Result<Self, ConfigurationError> {
        let spec = spec.trim();
        let (codes_raw, action_raw) = match spec.split_once(':') {
            Some((codes, action)) => (codes, Some(action.trim())),
            None => (spec, None),
        };
        let codes = crate::utils::parse_u16_set_csv(codes_raw)
            .map_err(|e| ConfigurationError::invalid("blacklist status", spec, e))?
            .into_iter()
            .collect();

        let action = match action_raw {
            None => BlacklistAction::Stop,
            Some(action) => {
                let (name, param) = match action.split_once('=') {
                    Some((n, p)) => (n.trim(), Some(p.trim())),
                    None => (action, None),
                };
                let key = name.to_ascii_lowercase();
                let ctor = REGISTRY
                    .iter()
                    .find(|(n, _)| *n == key)
                    .map(|(_, ctor)| *ctor)
                    .ok_or_else(|| ConfigurationError::UnknownPlugin {
                        kind: "blacklist action",
                        name: name.to_string(),
                    })?;
                ctor(param)?
            }
        };
        Ok(Self { codes, action })
    }

    pub fn action(&self) -> BlacklistAction {
        self.action
    }

    pub fn codes(&self) -> &BTreeSet<u16> {
        &self.codes
    }

    // the action to take for `status`, if it is blacklisted
    pub fn check(&self, status: u16) -> Option<BlacklistAction> {
        self.codes.contains(&status).then_some(self.action)
    }
}
