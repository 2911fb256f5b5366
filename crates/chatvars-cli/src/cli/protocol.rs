use std::sync::Arc;

use anyhow::Result;
use chatvars_core::codec::VariableIndex;
use chatvars_core::constants::commands;
use chatvars_core::filter::{ExpressionFilter, MessageFilter};
use chatvars_core::{
    DeleteVariableArgs, GetAllVariablesArgs, GetVariableArgs, MessageTarget, SetVariableArgs,
};
use serde_json::Value;

/// Message selection as typed on the command line
#[derive(Debug, Clone, Default)]
pub struct TargetArgs {
    pub mes: Option<i64>,
    pub filter: Option<String>,
}

impl TargetArgs {
    fn into_target(self) -> Result<MessageTarget> {
        let filter = match self.filter {
            Some(source) => {
                let filter = ExpressionFilter::parse(&source)?;
                tracing::debug!("Filtering messages with `{}`", filter.source());
                Some(Arc::new(filter) as Arc<dyn MessageFilter>)
            }
            None => None,
        };
        Ok(MessageTarget {
            message: self.mes,
            filter,
        })
    }
}

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Set a variable
    Set {
        key: Option<String>,
        value: String,
        index: Option<String>,
        /// Parse `value` as JSON instead of storing it as text
        json: bool,
        target: TargetArgs,
    },
    /// Get one variable
    Get {
        key: Option<String>,
        index: Option<String>,
        target: TargetArgs,
        unnamed: Option<String>,
    },
    /// Get every variable of a message
    GetAll {
        target: TargetArgs,
        unnamed: Option<String>,
    },
    /// Delete a variable
    Delete {
        key: Option<String>,
        target: TargetArgs,
        unnamed: Option<String>,
    },
    /// Keep the mirror reconciled until interrupted
    Watch,
}

impl CliCommand {
    pub fn name(&self) -> &'static str {
        match self {
            CliCommand::Set { .. } => commands::SET,
            CliCommand::Get { .. } => commands::GET,
            CliCommand::GetAll { .. } => commands::GET_ALL,
            CliCommand::Delete { .. } => commands::DELETE,
            CliCommand::Watch => "watch",
        }
    }
}

pub fn parse_value(raw: String, json: bool) -> Result<Value> {
    if json {
        Ok(serde_json::from_str(&raw)?)
    } else {
        Ok(Value::String(raw))
    }
}

fn parse_index(raw: Option<String>) -> Option<VariableIndex> {
    raw.as_deref().and_then(VariableIndex::parse)
}

pub fn set_args(
    key: Option<String>,
    value: String,
    index: Option<String>,
    json: bool,
    target: TargetArgs,
) -> Result<SetVariableArgs> {
    Ok(SetVariableArgs {
        key,
        value: parse_value(value, json)?,
        index: parse_index(index),
        target: target.into_target()?,
    })
}

pub fn get_args(
    key: Option<String>,
    index: Option<String>,
    target: TargetArgs,
    unnamed: Option<String>,
) -> Result<GetVariableArgs> {
    Ok(GetVariableArgs {
        key,
        index: parse_index(index),
        target: target.into_target()?,
        unnamed,
    })
}

pub fn get_all_args(target: TargetArgs, unnamed: Option<String>) -> Result<GetAllVariablesArgs> {
    Ok(GetAllVariablesArgs {
        target: target.into_target()?,
        unnamed,
    })
}

pub fn delete_args(
    key: Option<String>,
    target: TargetArgs,
    unnamed: Option<String>,
) -> Result<DeleteVariableArgs> {
    Ok(DeleteVariableArgs {
        key,
        target: target.into_target()?,
        unnamed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_is_text_unless_json() {
        assert_eq!(parse_value("[1]".into(), false).unwrap(), json!("[1]"));
        assert_eq!(parse_value("[1]".into(), true).unwrap(), json!([1]));
        assert!(parse_value("[1".into(), true).is_err());
    }

    #[test]
    fn test_set_args_parse_index_and_filter() {
        let args = set_args(
            Some("k".into()),
            "v".into(),
            Some("2".into()),
            false,
            TargetArgs {
                mes: Some(-1),
                filter: Some("is_user == true".into()),
            },
        )
        .unwrap();
        assert_eq!(args.index, Some(VariableIndex::Position(2)));
        assert_eq!(args.target.message, Some(-1));
        assert!(args.target.filter.is_some());
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        let target = TargetArgs {
            mes: None,
            filter: Some("name ==".into()),
        };
        assert!(get_all_args(target, None).is_err());
    }

    #[test]
    fn test_blank_index_means_none() {
        let args = get_args(Some("k".into()), Some("  ".into()), TargetArgs::default(), None).unwrap();
        assert!(args.index.is_none());
    }
}
