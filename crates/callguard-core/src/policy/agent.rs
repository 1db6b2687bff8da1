//! Tool scoping for agent files.
//!
//! An agent file may carry a `tools` key listing what the agent can use:
//!
//! ```text
//! tools: Bash, Read, owner/server, other/server:search, built_in
//! ```
//!
//! - a bare name is a built-in tool
//! - `owner/server` grants every tool of that MCP server
//! - `owner/server:tool` grants only the named tool of that server
//! - `built_in` grants all built-in tools
//! - URLs name servers too: `https://host:8080/mcp:tool`
//!
//! While an agent file is active its policy list replaces mode and user
//! policies entirely.

use serde::{Deserialize, Serialize};

use super::Policy;
use crate::tools::builtin_tool_names;

/// Keyword granting every built-in tool.
pub const ALL_BUILT_IN_KEYWORD: &str = "built_in";

/// One entry of an agent file's `tools` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentTool {
    BuiltIn(String),
    Mcp {
        server: String,
        /// `None` or an empty name grants the whole server.
        tool: Option<String>,
    },
}

/// A parsed `tools` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTools {
    pub tools: Vec<AgentTool>,
    /// Servers mentioned anywhere, deduplicated, in first-mention order.
    pub mcp_servers: Vec<String>,
    pub all_built_in: bool,
}

impl AgentTools {
    /// Parse a comma separated `tools` value. Blank entries are skipped.
    pub fn parse(value: &str) -> Self {
        let mut parsed = Self::default();
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if entry == ALL_BUILT_IN_KEYWORD {
                parsed.all_built_in = true;
                continue;
            }
            let tool = parse_entry(entry);
            if let AgentTool::Mcp { server, .. } = &tool {
                if !parsed.mcp_servers.contains(server) {
                    parsed.mcp_servers.push(server.clone());
                }
            }
            parsed.tools.push(tool);
        }
        parsed
    }

    /// Tool names granted on `server`, if the entries name any.
    fn listed_for(&self, server: &str) -> Vec<&str> {
        self.tools
            .iter()
            .filter_map(|tool| match tool {
                AgentTool::Mcp {
                    server: s,
                    tool: Some(name),
                } if s == server && !name.is_empty() => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn listed_built_ins(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter_map(|tool| match tool {
                AgentTool::BuiltIn(name) => Some(canonical_built_in(name)),
                AgentTool::Mcp { .. } => None,
            })
            .collect()
    }
}

fn parse_entry(entry: &str) -> AgentTool {
    if let Some(scheme) = entry.find("://") {
        let start = scheme + 3;
        let rest = &entry[start..];
        return match rest.rfind(':') {
            Some(pos) if !is_port(&rest[pos + 1..]) => AgentTool::Mcp {
                server: entry[..start + pos].to_string(),
                tool: Some(rest[pos + 1..].to_string()),
            },
            _ => AgentTool::Mcp {
                server: entry.to_string(),
                tool: None,
            },
        };
    }

    if entry.contains('/') {
        return match entry.split_once(':') {
            Some((server, tool)) => AgentTool::Mcp {
                server: server.to_string(),
                tool: Some(tool.to_string()),
            },
            None => AgentTool::Mcp {
                server: entry.to_string(),
                tool: None,
            },
        };
    }

    AgentTool::BuiltIn(entry.to_string())
}

fn is_port(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Agent files may spell built-in names in any case.
fn canonical_built_in(name: &str) -> &str {
    match builtin_tool_names().find(|builtin| builtin.eq_ignore_ascii_case(name)) {
        Some(builtin) => builtin,
        None => name,
    }
}

/// A connected MCP server and the tools it offers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServer {
    /// The slug or URL agent files use to refer to the server.
    pub slug: String,
    pub tools: Vec<String>,
}

impl McpServer {
    pub fn new<I, S>(slug: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slug: slug.into(),
            tools: tools.into_iter().map(Into::into).collect(),
        }
    }
}

/// Policies for an active agent file.
///
/// Without a `tools` key everything is allowed. Otherwise:
///
/// 1. a server listed with specific tools allows those and excludes the rest
///    of its tools
/// 2. naming built-ins, or naming servers without `built_in`, allows the
///    named built-ins and excludes every other built-in
/// 3. everything else is allowed
///
/// Servers that are not connected are skipped.
pub fn agent_file_policies(tools: Option<&AgentTools>, servers: &[McpServer]) -> Vec<Policy> {
    let Some(tools) = tools else {
        return vec![Policy::allow("*")];
    };

    let mut policies = Vec::new();
    for slug in &tools.mcp_servers {
        let Some(server) = servers.iter().find(|s| s.slug == *slug) else {
            log::warn!("No connected MCP server '{}' for agent file tools", slug);
            continue;
        };
        let listed = tools.listed_for(slug);
        if listed.is_empty() {
            continue;
        }
        policies.extend(listed.iter().map(|name| Policy::allow(*name)));
        policies.extend(
            server
                .tools
                .iter()
                .filter(|name| !listed.contains(&name.as_str()))
                .map(|name| Policy::exclude(name.as_str())),
        );
    }

    let built_ins = tools.listed_built_ins();
    if !built_ins.is_empty() || (!tools.mcp_servers.is_empty() && !tools.all_built_in) {
        policies.extend(built_ins.iter().map(|name| Policy::allow(*name)));
        policies.extend(
            builtin_tool_names()
                .filter(|name| !built_ins.contains(name))
                .map(Policy::exclude),
        );
    }

    policies.push(Policy::allow("*"));
    log::debug!("Agent file scopes tools with {} policies", policies.len());
    policies
}

/// An active agent file together with the MCP servers it can reach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentScope {
    /// The parsed `tools` key, `None` when the file has none.
    pub tools: Option<AgentTools>,
    pub servers: Vec<McpServer>,
}

impl AgentScope {
    pub fn new(tools: Option<AgentTools>, servers: Vec<McpServer>) -> Self {
        Self { tools, servers }
    }

    pub fn policies(&self) -> Vec<Policy> {
        agent_file_policies(self.tools.as_ref(), &self.servers)
    }
}
