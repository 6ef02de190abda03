//! Run configuration parsed from the plugin parameter string
//! (`key=value` pairs separated by commas).

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::CompileError;

lazy_static! {
    static ref OPTION:      Regex = Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_]*)\s*=\s*(\S+?)\s*$").unwrap();
    static ref MODULE_PATH: Regex = Regex::new(r"^(::)?[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$").unwrap();
}

/// Representation of 64-bit integer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongOption {
    Number,
    String,
    BigInt,
}

/// Representation of `google.protobuf.Timestamp` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOption {
    Timestamp,
    Date,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumJson {
    Name,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneofOption {
    Properties,
    Unions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientImpl {
    None,
    Rpc,
    Grpc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub long:           LongOption,
    pub date:           DateOption,
    pub string_enums:   bool,
    pub json_enums:     EnumJson,
    pub oneof:          OneofOption,
    pub snake_to_camel: bool,
    pub output_encode:  bool,
    pub output_json:    bool,
    pub output_partial: bool,
    pub client_impl:    ClientImpl,
    pub module_root:    String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            long:           LongOption::Number,
            date:           DateOption::Timestamp,
            string_enums:   false,
            json_enums:     EnumJson::Name,
            oneof:          OneofOption::Properties,
            snake_to_camel: true,
            output_encode:  true,
            output_json:    true,
            output_partial: true,
            client_impl:    ClientImpl::Rpc,
            module_root:    "crate".to_string(),
        }
    }
}

fn invalid(key: &str, msg: impl Into<String>) -> CompileError {
    CompileError::InvalidOption {
        key: key.to_string(),
        msg: msg.into(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CompileError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(invalid(key, format!("expected true or false, found \"{}\"", other))),
    }
}

impl Config {
    pub fn parse(parameter: &str) -> Result<Config, CompileError> {
        let mut config = Config::default();
        let mut seen = BTreeSet::new();

        for pair in parameter.split(',').filter(|pair| !pair.trim().is_empty()) {
            let captures = OPTION
                .captures(pair)
                .ok_or_else(|| invalid(pair.trim(), "expected key=value"))?;
            let key = &captures[1];
            let value = &captures[2];

            if !seen.insert(key.to_string()) {
                return Err(CompileError::ConflictingOptions(format!(
                    "\"{}\" is given more than once",
                    key
                )));
            }
            config.set(key, value)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CompileError> {
        let unknown_value = || invalid(key, format!("unsupported value \"{}\"", value));

        match key {
            "forceLong" => {
                self.long = match value {
                    "number" | "long" => LongOption::Number,
                    "string" => LongOption::String,
                    "bigint" => LongOption::BigInt,
                    _ => return Err(unknown_value()),
                }
            }
            "useDate" => {
                self.date = match value {
                    "timestamp" | "false" => DateOption::Timestamp,
                    "date" | "true" => DateOption::Date,
                    "string" => DateOption::String,
                    _ => return Err(unknown_value()),
                }
            }
            "jsonEnums" => {
                self.json_enums = match value {
                    "name" => EnumJson::Name,
                    "number" => EnumJson::Number,
                    _ => return Err(unknown_value()),
                }
            }
            "oneof" => {
                self.oneof = match value {
                    "properties" => OneofOption::Properties,
                    "unions" => OneofOption::Unions,
                    _ => return Err(unknown_value()),
                }
            }
            "outputClientImpl" => {
                self.client_impl = match value {
                    "true" => ClientImpl::Rpc,
                    "false" => ClientImpl::None,
                    "grpc" => ClientImpl::Grpc,
                    _ => return Err(unknown_value()),
                }
            }
            "moduleRoot" => {
                if !MODULE_PATH.is_match(value) {
                    return Err(invalid(key, format!("\"{}\" is not a Rust path", value)));
                }
                self.module_root = value.to_string();
            }
            "stringEnums"          => self.string_enums = parse_bool(key, value)?,
            "snakeToCamel"         => self.snake_to_camel = parse_bool(key, value)?,
            "outputEncodeMethods"  => self.output_encode = parse_bool(key, value)?,
            "outputJsonMethods"    => self.output_json = parse_bool(key, value)?,
            "outputPartialMethods" => self.output_partial = parse_bool(key, value)?,
            _ => return Err(invalid(key, "unknown option")),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), CompileError> {
        if self.client_impl != ClientImpl::None && !self.output_encode {
            return Err(CompileError::ConflictingOptions(
                "outputClientImpl requires outputEncodeMethods=true".to_string(),
            ));
        }
        Ok(())
    }
}
