// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The shell's CLI command surface (§4.10, §6).
//!
//! A pure parser from a line of text to a [`ShellCommand`] value; it has
//! no opinion on how lines are obtained (a readline loop, a script file,
//! or frames arriving over [`crate::tap::TapServer`]'s `command` request)
//! or on how a parsed command gets executed - that's the host
//! application's job, wiring these variants against a running
//! [`crate::dispatcher::Dispatcher`], [`crate::shell::Stats`], and so on.

use crate::shell::filter::{convert_legacy_shorthand, Joiner};
use crate::shell::rule::parse_select_list;

/// A command-parsing failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CommandError(String);

impl CommandError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// How the shell renders mirrored messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per message.
    Compact,
    /// One field per line.
    Vertical,
    /// Raw JSON.
    Json,
}

/// A declarative rule definition parsed from `rule add`, before it's
/// turned into a [`crate::shell::Rule`] (which also needs a
/// [`crate::shell::filter::FilterExpression`] compiled from `where_expr`).
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    /// The rule's name.
    pub name: String,
    /// The `FROM` topic gate.
    pub from_topic: String,
    /// The raw `SELECT` list text (already split into fields).
    pub select: Vec<crate::shell::rule::SelectField>,
    /// The raw, uncompiled `WHERE` expression text, if any.
    pub where_expr: Option<String>,
}

/// An action target parsed from `rule action`.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleActionSpec {
    /// `rule action <name> log <path>`
    Log(String),
    /// `rule action <name> forward <topic>`
    Forward(String),
}

/// A fully parsed shell command (§4.10 CLI surface, §6).
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// `filter add [and|or] <expr>`
    FilterAdd { joiner: Joiner, expr: String },
    /// `filter clear`
    FilterClear,
    /// `filter show`
    FilterShow,
    /// `filter save <name>`
    FilterSave(String),
    /// `filter load <name>`
    FilterLoad(String),
    /// `filter delete <name>`
    FilterDelete(String),
    /// `filter list`
    FilterList,
    /// `stats show`
    StatsShow,
    /// `stats reset`
    StatsReset,
    /// `history show [n]`
    HistoryShow(Option<usize>),
    /// `history search <pattern>`
    HistorySearch(String),
    /// `tree [depth]`
    Tree(Option<usize>),
    /// `flow [limit] [topic]`
    Flow(Option<usize>, Option<String>),
    /// `rule add <name> from <topic> select <fields> [where <expr>]`
    RuleAdd(RuleSpec),
    /// `rule action <name> log|forward <target>`
    RuleAction(String, RuleActionSpec),
    /// `rule enable <name>`
    RuleEnable(String),
    /// `rule disable <name>`
    RuleDisable(String),
    /// `rule remove <name>`
    RuleRemove(String),
    /// `rule list`
    RuleList,
    /// `pause`
    Pause,
    /// `resume`
    Resume,
    /// `format compact|vertical|json`
    Format(OutputFormat),
    /// `quit`
    Quit,
}

/// Parses one line of shell input into a [`ShellCommand`].
///
/// # Errors
///
/// Returns [`CommandError`] if the line doesn't name a known command, or
/// a known command is missing required arguments.
pub fn parse_command(line: &str) -> Result<ShellCommand, CommandError> {
    let tokens = split_words(line);
    let mut iter = tokens.iter().map(String::as_str);
    let head = iter
        .next()
        .ok_or_else(|| CommandError::new("empty command"))?;

    match head {
        "filter" => parse_filter_command(&mut iter),
        "stats" => parse_stats_command(&mut iter),
        "history" => parse_history_command(&mut iter),
        "tree" => Ok(ShellCommand::Tree(iter.next().and_then(|s| s.parse().ok()))),
        "flow" => parse_flow_command(&mut iter),
        "rule" => parse_rule_command(&mut iter),
        "pause" => Ok(ShellCommand::Pause),
        "resume" => Ok(ShellCommand::Resume),
        "format" => parse_format_command(&mut iter),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        other => Err(CommandError::new(format!("unknown command '{other}'"))),
    }
}

fn parse_filter_command<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
) -> Result<ShellCommand, CommandError> {
    match iter.next() {
        Some("add") => {
            let mut rest: Vec<&str> = iter.collect();
            let joiner = match rest.first().copied() {
                Some("and") => {
                    rest.remove(0);
                    Joiner::And
                }
                Some("or") => {
                    rest.remove(0);
                    Joiner::Or
                }
                _ => Joiner::And,
            };
            if rest.is_empty() {
                return Err(CommandError::new("filter add requires an expression"));
            }
            let expr = convert_legacy_shorthand(&rest.join(" "));
            Ok(ShellCommand::FilterAdd { joiner, expr })
        }
        Some("clear") => Ok(ShellCommand::FilterClear),
        Some("show") => Ok(ShellCommand::FilterShow),
        Some("list") => Ok(ShellCommand::FilterList),
        Some("save") => require_name(iter, "filter save").map(ShellCommand::FilterSave),
        Some("load") => require_name(iter, "filter load").map(ShellCommand::FilterLoad),
        Some("delete") => require_name(iter, "filter delete").map(ShellCommand::FilterDelete),
        Some(other) => Err(CommandError::new(format!("unknown filter subcommand '{other}'"))),
        None => Err(CommandError::new("filter requires a subcommand")),
    }
}

fn parse_stats_command<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
) -> Result<ShellCommand, CommandError> {
    match iter.next() {
        Some("show") => Ok(ShellCommand::StatsShow),
        Some("reset") => Ok(ShellCommand::StatsReset),
        Some(other) => Err(CommandError::new(format!("unknown stats subcommand '{other}'"))),
        None => Err(CommandError::new("stats requires a subcommand")),
    }
}

fn parse_history_command<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
) -> Result<ShellCommand, CommandError> {
    match iter.next() {
        Some("show") => Ok(ShellCommand::HistoryShow(
            iter.next().and_then(|s| s.parse().ok()),
        )),
        Some("search") => {
            let pattern = iter
                .next()
                .ok_or_else(|| CommandError::new("history search requires a topic pattern"))?;
            Ok(ShellCommand::HistorySearch(pattern.to_string()))
        }
        Some(other) => Err(CommandError::new(format!("unknown history subcommand '{other}'"))),
        None => Err(CommandError::new("history requires a subcommand")),
    }
}

fn parse_flow_command<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
) -> Result<ShellCommand, CommandError> {
    let rest: Vec<&str> = iter.collect();
    let (limit, topic) = match rest.as_slice() {
        [] => (None, None),
        [only] => match only.parse::<usize>() {
            Ok(n) => (Some(n), None),
            Err(_) => (None, Some((*only).to_string())),
        },
        [first, second, ..] => (first.parse().ok(), Some((*second).to_string())),
    };
    Ok(ShellCommand::Flow(limit, topic))
}

fn parse_rule_command<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
) -> Result<ShellCommand, CommandError> {
    match iter.next() {
        Some("add") => parse_rule_add(iter),
        Some("action") => {
            let name = require_name(iter, "rule action")?;
            match iter.next() {
                Some("log") => {
                    let path = iter
                        .next()
                        .ok_or_else(|| CommandError::new("rule action log requires a path"))?;
                    Ok(ShellCommand::RuleAction(name, RuleActionSpec::Log(path.to_string())))
                }
                Some("forward") => {
                    let topic = iter
                        .next()
                        .ok_or_else(|| CommandError::new("rule action forward requires a topic"))?;
                    Ok(ShellCommand::RuleAction(name, RuleActionSpec::Forward(topic.to_string())))
                }
                _ => Err(CommandError::new("rule action requires 'log' or 'forward'")),
            }
        }
        Some("enable") => require_name(iter, "rule enable").map(ShellCommand::RuleEnable),
        Some("disable") => require_name(iter, "rule disable").map(ShellCommand::RuleDisable),
        Some("remove") => require_name(iter, "rule remove").map(ShellCommand::RuleRemove),
        Some("list") => Ok(ShellCommand::RuleList),
        Some(other) => Err(CommandError::new(format!("unknown rule subcommand '{other}'"))),
        None => Err(CommandError::new("rule requires a subcommand")),
    }
}

fn parse_rule_add<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
) -> Result<ShellCommand, CommandError> {
    let name = iter
        .next()
        .ok_or_else(|| CommandError::new("rule add requires a name"))?
        .to_string();
    let rest: Vec<&str> = iter.collect();
    let joined = rest.join(" ");

    let from_idx = joined
        .find("from ")
        .ok_or_else(|| CommandError::new("rule add requires 'from <topic>'"))?;
    let after_from = &joined[from_idx + 5..];

    let select_idx = joined.find("select ");
    let where_idx = joined.find("where ");

    let from_topic = match select_idx {
        Some(idx) if idx > from_idx => joined[from_idx + 5..idx].trim().to_string(),
        _ => after_from.split_whitespace().next().unwrap_or("").to_string(),
    };
    if from_topic.is_empty() {
        return Err(CommandError::new("rule add requires a non-empty topic"));
    }

    let select = match (select_idx, where_idx) {
        (Some(s), Some(w)) if w > s => parse_select_list(joined[s + 7..w].trim()),
        (Some(s), _) => parse_select_list(joined[s + 7..].trim()),
        (None, _) => Vec::new(),
    };

    let where_expr = where_idx.map(|idx| joined[idx + 6..].trim().to_string());

    Ok(ShellCommand::RuleAdd(RuleSpec {
        name,
        from_topic,
        select,
        where_expr,
    }))
}

fn parse_format_command<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
) -> Result<ShellCommand, CommandError> {
    match iter.next() {
        Some("compact") => Ok(ShellCommand::Format(OutputFormat::Compact)),
        Some("vertical") => Ok(ShellCommand::Format(OutputFormat::Vertical)),
        Some("json") => Ok(ShellCommand::Format(OutputFormat::Json)),
        Some(other) => Err(CommandError::new(format!("unknown output format '{other}'"))),
        None => Err(CommandError::new("format requires compact|vertical|json")),
    }
}

fn require_name<'a>(
    iter: &mut impl Iterator<Item = &'a str>,
    command: &str,
) -> Result<String, CommandError> {
    iter.next()
        .map(str::to_string)
        .ok_or_else(|| CommandError::new(format!("{command} requires a name")))
}

/// Splits a line into shell-like words, honoring single/double-quoted
/// segments so e.g. `filter add topic = 'a/b'` keeps `a/b c` together as
/// one word. Quote characters are kept in the returned word (rather than
/// stripped) so a command built by rejoining words with spaces remains
/// valid input to [`crate::shell::filter::FilterExpression::parse`].
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => {
                current.push(c);
                quote = None;
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                current.push(c);
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filter_add_with_legacy_shorthand() {
        let cmd = parse_command("filter add topic:sensors/# qos:1").unwrap();
        assert_eq!(
            cmd,
            ShellCommand::FilterAdd {
                joiner: Joiner::And,
                expr: "topic like 'sensors/#' and qos = 1".to_string(),
            }
        );
    }

    #[test]
    fn parses_filter_add_with_explicit_or_joiner() {
        let cmd = parse_command("filter add or qos = 2").unwrap();
        assert_eq!(
            cmd,
            ShellCommand::FilterAdd {
                joiner: Joiner::Or,
                expr: "qos = 2".to_string(),
            }
        );
    }

    #[test]
    fn parses_filter_subcommands() {
        assert_eq!(parse_command("filter clear").unwrap(), ShellCommand::FilterClear);
        assert_eq!(parse_command("filter show").unwrap(), ShellCommand::FilterShow);
        assert_eq!(
            parse_command("filter save mine").unwrap(),
            ShellCommand::FilterSave("mine".to_string())
        );
    }

    #[test]
    fn parses_history_show_with_optional_count() {
        assert_eq!(
            parse_command("history show 5").unwrap(),
            ShellCommand::HistoryShow(Some(5))
        );
        assert_eq!(
            parse_command("history show").unwrap(),
            ShellCommand::HistoryShow(None)
        );
    }

    #[test]
    fn parses_history_search() {
        assert_eq!(
            parse_command("history search sensors/#").unwrap(),
            ShellCommand::HistorySearch("sensors/#".to_string())
        );
    }

    #[test]
    fn parses_flow_with_limit_and_topic() {
        assert_eq!(
            parse_command("flow 10 sensors/#").unwrap(),
            ShellCommand::Flow(Some(10), Some("sensors/#".to_string()))
        );
        assert_eq!(
            parse_command("flow sensors/#").unwrap(),
            ShellCommand::Flow(None, Some("sensors/#".to_string()))
        );
        assert_eq!(parse_command("flow").unwrap(), ShellCommand::Flow(None, None));
    }

    #[test]
    fn parses_rule_add_with_select_and_where() {
        let cmd = parse_command(
            "rule add hot-temps from sensors/# select topic, payload.temperature as temp where payload.temperature > 30",
        )
        .unwrap();
        match cmd {
            ShellCommand::RuleAdd(spec) => {
                assert_eq!(spec.name, "hot-temps");
                assert_eq!(spec.from_topic, "sensors/#");
                assert_eq!(spec.select.len(), 2);
                assert_eq!(spec.where_expr.as_deref(), Some("payload.temperature > 30"));
            }
            other => panic!("expected RuleAdd, got {other:?}"),
        }
    }

    #[test]
    fn parses_rule_action_and_lifecycle_commands() {
        assert_eq!(
            parse_command("rule action hot-temps forward alerts/x").unwrap(),
            ShellCommand::RuleAction("hot-temps".to_string(), RuleActionSpec::Forward("alerts/x".to_string()))
        );
        assert_eq!(
            parse_command("rule disable hot-temps").unwrap(),
            ShellCommand::RuleDisable("hot-temps".to_string())
        );
        assert_eq!(parse_command("rule list").unwrap(), ShellCommand::RuleList);
    }

    #[test]
    fn parses_format_and_control_commands() {
        assert_eq!(
            parse_command("format json").unwrap(),
            ShellCommand::Format(OutputFormat::Json)
        );
        assert_eq!(parse_command("pause").unwrap(), ShellCommand::Pause);
        assert_eq!(parse_command("resume").unwrap(), ShellCommand::Resume);
        assert_eq!(parse_command("quit").unwrap(), ShellCommand::Quit);
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse_command("bogus").is_err());
    }

    #[test]
    fn quoted_segments_are_kept_intact() {
        let cmd = parse_command("filter add topic = 'a/b c'").unwrap();
        match cmd {
            ShellCommand::FilterAdd { expr, .. } => assert!(expr.contains("a/b c")),
            other => panic!("expected FilterAdd, got {other:?}"),
        }
    }
}
