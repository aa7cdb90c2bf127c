//! Parser for the old-style (OpenStep) property lists Xcode uses for
//! `project.pbxproj`.

use anyhow::{bail, Result};
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_until, take_while1},
    character::complete::{char, multispace1, none_of},
    combinator::{all_consuming, map, opt, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    String(String),
    Array(Vec<Node>),
    Dict(IndexMap<String, Node>),
}

impl Node {
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_dict().and_then(|d| d.get(key))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Dict(d) => Some(d),
            _ => None,
        }
    }
}

/// Parse a whole document.
pub fn parse(input: &str) -> Result<Node> {
    match all_consuming(terminated(node, ws))(input) {
        Ok((_, node)) => Ok(node),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            let offset = input.len() - e.input.len();
            bail!("invalid property list at byte {offset}")
        }
        Err(nom::Err::Incomplete(_)) => bail!("truncated property list"),
    }
}

fn comment(input: &str) -> IResult<&str, ()> {
    alt((
        value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        value((), pair(tag("//"), opt(is_not("\n")))),
    ))(input)
}

/// Whitespace and comments.
fn ws(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((value((), multispace1), comment))))(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    let escape = alt((
        value("\\", tag("\\")),
        value("\"", tag("\"")),
        value("\n", tag("n")),
        value("\t", tag("t")),
    ));
    delimited(
        char('"'),
        map(
            opt(escaped_transform(none_of("\"\\"), '\\', escape)),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || "_$./:-+".contains(c))(input)
}

fn string(input: &str) -> IResult<&str, String> {
    alt((quoted, map(bare, str::to_string)))(input)
}

fn dict(input: &str) -> IResult<&str, IndexMap<String, Node>> {
    let entry = terminated(
        pair(preceded(ws, string), preceded(pair(ws, char('=')), node)),
        pair(ws, char(';')),
    );
    map(
        delimited(char('{'), many0(entry), pair(ws, char('}'))),
        |entries| entries.into_iter().collect(),
    )(input)
}

fn array(input: &str) -> IResult<&str, Vec<Node>> {
    delimited(
        char('('),
        terminated(
            separated_list0(pair(ws, char(',')), node),
            opt(pair(ws, char(','))),
        ),
        pair(ws, char(')')),
    )(input)
}

fn node(input: &str) -> IResult<&str, Node> {
    preceded(
        ws,
        alt((
            map(dict, Node::Dict),
            map(array, Node::Array),
            map(string, Node::String),
        )),
    )(input)
}
