//! Turns one line of input into a [`Command`] graph.
//!
//! Operators bind, from loosest to tightest: `;` (sequence), `&&`/`||`
//! (and/or list), `|` (pipeline), then the per-stage redirections `<`, `>`,
//! `>>` and a trailing `&`. There is no quoting: arguments are whatever is
//! left between runs of whitespace once the operators are removed.

use crate::command::{Command, LogicOp};
use crate::error::ParseError;

/// Parse a whole input line.
///
/// Returns `Ok(None)` for a line with nothing to run (blank, or only `;`).
/// Any syntax error discards everything parsed so far.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let mut units = Vec::new();
    for text in line.split(';') {
        let text = text.trim();
        if !text.is_empty() {
            units.push(parse_unit(text)?);
        }
    }

    let mut next = None;
    for mut unit in units.into_iter().rev() {
        unit.sequence_next = next;
        next = Some(Box::new(unit));
    }
    Ok(next.map(|unit| *unit))
}

/// Parse one `;`-separated unit: an and/or list with an optional trailing `&`.
fn parse_unit(text: &str) -> Result<Command, ParseError> {
    let (text, background) = strip_background(text);
    let (first, rest) = split_logical(text);

    let mut first = parse_element(first, || match rest.first() {
        Some((op, _)) => op.symbol(),
        None => "&",
    })?;
    let mut continuations = Vec::with_capacity(rest.len());
    for (op, element) in rest {
        continuations.push((op, parse_element(element, || op.symbol())?));
    }

    if background {
        let last = match continuations.last_mut() {
            Some((_, pipeline)) => pipeline,
            None => &mut first,
        };
        let mut stage = Some(last);
        while let Some(current) = stage {
            current.background = true;
            stage = current.pipe_next.as_deref_mut();
        }
    }

    let mut tail = None;
    for (op, mut pipeline) in continuations.into_iter().rev() {
        pipeline.logic_next = tail;
        tail = Some((op, Box::new(pipeline)));
    }
    first.logic_next = tail;
    Ok(first)
}

/// Parse one element of an and/or list. `near` names the operator to blame
/// when the element is empty.
fn parse_element(
    text: &str,
    near: impl FnOnce() -> &'static str,
) -> Result<Command, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::UnexpectedOperator(near()));
    }
    parse_pipeline(text)
}

/// Remove a trailing `&` that is not the second half of `&&`.
fn strip_background(text: &str) -> (&str, bool) {
    match text.strip_suffix('&') {
        Some(rest) if !rest.ends_with('&') => (rest.trim_end(), true),
        _ => (text, false),
    }
}

/// Split an and/or list left to right into its first element and the
/// elements that follow, each paired with the operator in front of it.
fn split_logical(text: &str) -> (&str, Vec<(LogicOp, &str)>) {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut pending: Option<LogicOp> = None;
    let mut start = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        let op = match &bytes[i..i + 2] {
            b"&&" => LogicOp::And,
            b"||" => LogicOp::Or,
            _ => {
                i += 1;
                continue;
            }
        };
        pieces.push((pending.replace(op), &text[start..i]));
        i += 2;
        start = i;
    }
    pieces.push((pending, &text[start..]));

    let mut pieces = pieces.into_iter();
    let first = pieces.next().map_or("", |(_, text)| text);
    let rest = pieces
        .filter_map(|(op, text)| op.map(|op| (op, text)))
        .collect();
    (first, rest)
}

fn parse_pipeline(text: &str) -> Result<Command, ParseError> {
    let mut stages = Vec::new();
    for stage in text.split('|') {
        let stage = stage.trim();
        if stage.is_empty() {
            return Err(ParseError::UnexpectedOperator("|"));
        }
        stages.push(parse_stage(stage)?);
    }

    let mut next = None;
    for mut stage in stages.into_iter().rev() {
        stage.pipe_next = next;
        next = Some(Box::new(stage));
    }
    next.map(|stage| *stage)
        .ok_or(ParseError::UnexpectedOperator("|"))
}

/// Extract redirections from one stage, then split what is left into `argv`.
fn parse_stage(text: &str) -> Result<Command, ParseError> {
    let mut command = Command::default();
    let mut rest = String::with_capacity(text.len());
    let mut tail = text;

    while let Some(pos) = tail.find(&['<', '>'][..]) {
        rest.push_str(&tail[..pos]);
        rest.push(' ');

        let operator = &tail[pos..];
        let (symbol, after) = if operator.starts_with(">>") {
            (">>", &operator[2..])
        } else {
            (&operator[..1], &operator[1..])
        };

        let after = after.trim_start();
        let end = after
            .find(|c: char| c.is_whitespace() || c == '<' || c == '>')
            .unwrap_or(after.len());
        let (target, remaining) = after.split_at(end);
        match symbol {
            "<" if !target.is_empty() => command.input_redirect = Some(target.to_owned()),
            ">" | ">>" if !target.is_empty() => {
                command.output_redirect = Some(target.to_owned());
                command.append = symbol == ">>";
            }
            "<" => return Err(ParseError::MissingRedirectTarget("<")),
            ">" => return Err(ParseError::MissingRedirectTarget(">")),
            _ => return Err(ParseError::MissingRedirectTarget(">>")),
        }
        tail = remaining;
    }
    rest.push_str(tail);

    command.argv = rest.split_whitespace().map(str::to_owned).collect();
    if command.argv.is_empty() {
        return Err(ParseError::MissingCommand);
    }
    Ok(command)
}
