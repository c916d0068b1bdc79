//! Operator console commands

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::engine::Mode;

/// Command parse errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("invalid mode: {0} (expected auto or manual)")]
    InvalidMode(String),
}

/// A line typed at the operator console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Manual order; the side string is validated by the engine
    Order { side: String, quantity: Decimal },
    Mode(Mode),
    Symbol(String),
    Capital(Decimal),
    Leverage(u32),
    Start,
    Stop,
    Status,
    Lock(String),
    Unlock,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  buy <qty> | sell <qty>     manual order (closes when it reduces the position)
  order <side> <qty>         manual order with an explicit side
  mode auto|manual           switch trading mode
  symbol <SYMBOL>            change the traded symbol
  capital <amount>           overwrite free capital
  leverage <n>               set leverage
  start | stop               control the trading loop
  lock [reason] | unlock     risk lock override
  status                     show engine status
  quit                       stop and exit";

fn decimal(token: Option<&str>, usage: &'static str) -> Result<Decimal, CommandError> {
    let token = token.ok_or(CommandError::Usage(usage))?;
    Decimal::from_str(token).map_err(|_| CommandError::InvalidNumber(token.to_string()))
}

impl FromStr for OperatorCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return Err(CommandError::Usage("help"));
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "buy" | "sell" => OperatorCommand::Order {
                side: head.to_string(),
                quantity: decimal(tokens.next(), "buy|sell <qty>")?,
            },
            "order" => {
                let side = tokens
                    .next()
                    .ok_or(CommandError::Usage("order <side> <qty>"))?
                    .to_string();
                OperatorCommand::Order {
                    side,
                    quantity: decimal(tokens.next(), "order <side> <qty>")?,
                }
            }
            "mode" => {
                let mode = tokens.next().ok_or(CommandError::Usage("mode auto|manual"))?;
                OperatorCommand::Mode(
                    mode.parse()
                        .map_err(|_| CommandError::InvalidMode(mode.to_string()))?,
                )
            }
            "symbol" => OperatorCommand::Symbol(
                tokens
                    .next()
                    .ok_or(CommandError::Usage("symbol <SYMBOL>"))?
                    .to_ascii_uppercase(),
            ),
            "capital" => OperatorCommand::Capital(decimal(tokens.next(), "capital <amount>")?),
            "leverage" => {
                let token = tokens.next().ok_or(CommandError::Usage("leverage <n>"))?;
                OperatorCommand::Leverage(
                    token
                        .parse()
                        .map_err(|_| CommandError::InvalidNumber(token.to_string()))?,
                )
            }
            "start" => OperatorCommand::Start,
            "stop" => OperatorCommand::Stop,
            "status" => OperatorCommand::Status,
            "lock" => {
                let reason = tokens.collect::<Vec<_>>().join(" ");
                OperatorCommand::Lock(if reason.is_empty() {
                    "operator request".to_string()
                } else {
                    reason
                })
            }
            "unlock" => OperatorCommand::Unlock,
            "help" | "?" => OperatorCommand::Help,
            "quit" | "exit" => OperatorCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}
