// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Instance Config Generator
//!
//! Pure transform from a structured [`InstanceConfig`] to the complete
//! gateway configuration document plus a fresh auth token. The only side
//! effect is writing the document under the instance's config directory;
//! every generation produces the full document from scratch.
//!
//! Secret placement policy: the provider API key goes into the `env` block
//! only. The auth profile references the provider and mode but never embeds
//! the raw key; the gateway reads credentials from its environment.

use anyhow::{Context, Result};
use rand::RngCore;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::debug;

use crate::domain::instance::{DmPolicy, InstanceConfig};

/// The gateway process always listens on this port inside the container;
/// only the host-mapped port varies per instance.
pub const GATEWAY_INTERNAL_PORT: u16 = 18789;

/// Workspace directory inside the gateway container.
pub const CONTAINER_WORKSPACE: &str = "/home/node/.openclaw/workspace";

/// Where the generated document is bound inside the container.
pub const CONTAINER_CONFIG_PATH: &str = "/home/node/.openclaw/openclaw.json";

/// File name of the generated document on the host.
pub const GATEWAY_CONFIG_FILE: &str = "openclaw.json";

/// 32 random bytes, hex encoded. Generated once per container creation and
/// never regenerated implicitly.
pub fn generate_gateway_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Resolve the primary model key for the gateway document.
///
/// A model already carrying a provider prefix separator is used verbatim.
/// Otherwise `openrouter` and `anthropic` get that literal prefix, `openai`
/// needs none, and any other provider falls back to `provider/model` with
/// `"default"` standing in for a missing model (`"auto"` for openrouter).
pub fn resolve_model_key(provider: &str, model: Option<&str>) -> String {
    if let Some(model) = model {
        if model.contains('/') {
            return model.to_string();
        }
    }
    let fallback = if provider == "openrouter" { "auto" } else { "default" };
    let model = model.unwrap_or(fallback);
    match provider {
        "openrouter" => format!("openrouter/{model}"),
        "anthropic" => format!("anthropic/{model}"),
        "openai" => model.to_string(),
        other => format!("{other}/{model}"),
    }
}

/// Canonical env var carrying the provider credential.
pub fn provider_env_key(provider: &str) -> String {
    match provider {
        "openrouter" => "OPENROUTER_API_KEY".to_string(),
        "anthropic" => "ANTHROPIC_API_KEY".to_string(),
        "openai" => "OPENAI_API_KEY".to_string(),
        // Ollama takes a base URL instead of a key.
        "ollama" => "OLLAMA_BASE_URL".to_string(),
        other => format!("{}_API_KEY", other.to_uppercase()),
    }
}

/// Split a caller-supplied comma-separated id list; `None` or empty means
/// allow-all (`["*"]`).
fn id_allowlist(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.is_empty() => raw.split(',').map(|id| id.trim().to_string()).collect(),
        _ => vec!["*".to_string()],
    }
}

/// Build the complete gateway configuration document.
pub fn build_gateway_document(config: &InstanceConfig, gateway_token: &str) -> Value {
    let model_key = resolve_model_key(&config.provider, config.model.as_deref());

    let mut env = Map::new();
    if !config.api_key.is_empty() {
        env.insert(provider_env_key(&config.provider), json!(config.api_key));
    }
    if let Some(base_url) = &config.base_url {
        if config.provider != "ollama" {
            env.insert(
                format!("{}_BASE_URL", config.provider.to_uppercase()),
                json!(base_url),
            );
        }
    }

    let mut models = Map::new();
    let model_entry = if config.provider == "openrouter" {
        json!({ "alias": "OpenRouter" })
    } else {
        json!({})
    };
    models.insert(model_key.clone(), model_entry);

    // The profile deliberately omits the key itself; the gateway resolves
    // credentials from the env block at runtime.
    let mut profile = Map::new();
    profile.insert("provider".to_string(), json!(config.provider));
    profile.insert("mode".to_string(), json!("api_key"));
    if let Some(base_url) = &config.base_url {
        profile.insert("base_url".to_string(), json!(base_url));
    }
    let mut profiles = Map::new();
    profiles.insert(format!("{}:default", config.provider), Value::Object(profile));

    // Channel blocks are gated solely on credential presence.
    let mut channels = Map::new();
    let mut plugin_entries = Map::new();

    if let Some(telegram) = &config.telegram {
        if !telegram.bot_token.is_empty() {
            channels.insert(
                "telegram".to_string(),
                json!({
                    "enabled": true,
                    "botToken": telegram.bot_token,
                    "allowFrom": id_allowlist(telegram.chat_id.as_deref()),
                }),
            );
        }
    }

    if let Some(discord) = &config.discord {
        if !discord.token.is_empty() {
            let guild_id = discord.guild_id.clone().unwrap_or_else(|| "*".to_string());
            channels.insert(
                "discord".to_string(),
                json!({
                    "enabled": true,
                    "token": discord.token,
                    "guilds": {
                        (guild_id): {
                            "channels": id_allowlist(discord.channel_id.as_deref()),
                            "requireMention": false,
                        },
                    },
                }),
            );
        }
    }

    if let Some(slack) = &config.slack {
        if !slack.bot_token.is_empty() && !slack.app_token.is_empty() {
            channels.insert(
                "slack".to_string(),
                json!({
                    "enabled": true,
                    "botToken": slack.bot_token,
                    "appToken": slack.app_token,
                }),
            );
        }
    }

    if let Some(matrix) = &config.matrix {
        if !matrix.homeserver_url.is_empty() && !matrix.access_token.is_empty() {
            let rooms = id_allowlist(matrix.room_id.as_deref());
            let policy = matrix.dm_policy.unwrap_or(DmPolicy::Pairing);
            let mut dm = Map::new();
            dm.insert("policy".to_string(), json!(policy));
            if policy == DmPolicy::Open {
                dm.insert("allowFrom".to_string(), json!(["*"]));
            }
            let mut block = Map::new();
            block.insert("enabled".to_string(), json!(true));
            block.insert("homeserver".to_string(), json!(matrix.homeserver_url));
            block.insert("accessToken".to_string(), json!(matrix.access_token));
            block.insert("deviceName".to_string(), json!("OpenClaw Cloud Gateway"));
            block.insert("encryption".to_string(), json!(true));
            // A wildcard allowlist means "all rooms"; omit the key entirely.
            if rooms.first().map(String::as_str) != Some("*") {
                block.insert("rooms".to_string(), json!(rooms));
            }
            block.insert("dm".to_string(), Value::Object(dm));
            channels.insert("matrix".to_string(), Value::Object(block));

            // The matrix channel needs its companion plugin loaded.
            plugin_entries.insert("matrix".to_string(), json!({ "enabled": true }));
        }
    }

    json!({
        "env": env,
        "messages": {
            "ackReactionScope": "group-mentions",
        },
        "agents": {
            "defaults": {
                "maxConcurrent": 4,
                "subagents": {
                    "maxConcurrent": 8,
                },
                "compaction": {
                    "mode": "safeguard",
                },
                "workspace": CONTAINER_WORKSPACE,
                "models": models,
                "model": {
                    "primary": model_key,
                },
            },
        },
        "gateway": {
            "mode": "local",
            "auth": {
                "mode": "token",
                "token": gateway_token,
            },
            "port": GATEWAY_INTERNAL_PORT,
            "bind": "loopback",
            "tailscale": {
                "mode": "off",
                "resetOnExit": false,
            },
        },
        "auth": {
            "profiles": profiles,
        },
        "skills": {
            "install": {
                "nodeManager": "pnpm",
            },
        },
        "hooks": {
            "internal": {
                "enabled": true,
                "entries": {
                    "session-memory": {
                        "enabled": true,
                    },
                },
            },
        },
        "channels": channels,
        "plugins": {
            "load": {
                "paths": [],
            },
            "entries": plugin_entries,
        },
    })
}

/// Generate the document and write it to `<config_dir>/openclaw.json`.
/// Returns the freshly generated gateway token.
pub async fn write_gateway_config(config: &InstanceConfig, config_dir: &Path) -> Result<String> {
    let gateway_token = generate_gateway_token();
    let document = build_gateway_document(config, &gateway_token);
    let path = config_dir.join(GATEWAY_CONFIG_FILE);
    let rendered = serde_json::to_string_pretty(&document).context("serializing gateway config")?;
    tokio::fs::write(&path, rendered)
        .await
        .with_context(|| format!("writing gateway config to {}", path.display()))?;
    debug!(path = %path.display(), "wrote gateway config");
    Ok(gateway_token)
}
