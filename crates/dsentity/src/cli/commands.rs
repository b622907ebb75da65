//! Execution of CLI commands through the entity layer.

use anyhow::{bail, Context, Result};
use dsentity_core::store::{ConnectOptions, Connector, Cursor, Operator, Record};
use dsentity_core::{Entity, FetchOptions, Key, KeyId, PathPart, SaveOptions, Schema, Value};

use crate::output::{render_keys, render_record, render_records};

use super::{parse_path, parse_value, Cli, Command};

/// Run a parsed command and return its rendered output.
pub async fn run(cli: Cli, connector: &dyn Connector) -> Result<String> {
    let format = cli.global.format;
    let mut options = ConnectOptions::new();
    if let Some(namespace) = &cli.global.namespace {
        options = options.namespace(namespace.as_str());
    }
    if let Some(profile) = &cli.global.profile {
        options = options.credentials_profile(profile.as_str());
    }

    match cli.command {
        Command::Get { path } => {
            let entity = entity_for_path(&path, connector, &options).await?;
            let key = complete_key(&entity, &path)?;
            let record = entity.find_by_key(&key).await?;
            Ok(render_record(record.as_ref(), format))
        }

        Command::Put {
            kind,
            id,
            parent,
            props,
            exclude,
        } => {
            let mut entity = Entity::connected(Schema::new(kind), connector, &options).await?;

            let mut save = SaveOptions::new();
            if let Some(id) = id {
                save = save.id(key_id(&id));
            }
            if !parent.is_empty() {
                let parent = entity.generate_key(parse_path(&parent))?;
                if !parent.is_complete() {
                    bail!("parent key {parent} has no id");
                }
                save = save.parent(parent);
            }
            for (name, value) in parse_props(&props)? {
                save = save.extra_prop(name, value);
            }
            for name in exclude {
                save = save.exclude(name);
            }

            let key = entity.save(save).await?;
            tracing::info!(key = %key, "Stored entity");
            Ok(render_keys(&[key], format))
        }

        Command::Find {
            kind,
            property,
            op,
            value,
            limit,
        } => {
            let entity = Entity::connected(Schema::new(kind), connector, &options).await?;
            let op: Operator = op.parse()?;
            let records = entity
                .find_by_value(&property, op, parse_value(&value), limit)
                .await?;
            Ok(render_records(&records, None, format))
        }

        Command::Page {
            kind,
            property,
            value,
            limit,
            cursor,
        } => {
            let entity = Entity::connected(Schema::new(kind), connector, &options).await?;
            let fetch = FetchOptions::new()
                .limit(limit)
                .paginate(true)
                .cursor(cursor.map(Cursor::from));
            let page = entity
                .get_objects(&property, parse_value(&value), fetch)
                .await?;

            let records: Vec<_> = page
                .items
                .into_iter()
                .filter_map(|mut item| {
                    let key = item.key()?.clone();
                    Some(Record::new(key, item.to_map()))
                })
                .collect();
            Ok(render_records(&records, page.next_cursor.as_ref(), format))
        }

        Command::Children {
            kind,
            limit,
            ancestor,
        } => {
            let entity = Entity::connected(Schema::new(kind), connector, &options).await?;
            let ancestor = complete_key(&entity, &ancestor)?;
            let records = entity.find_by_ancestor(&ancestor, limit).await?;
            Ok(render_records(&records, None, format))
        }

        Command::Delete { path } => {
            let mut entity = entity_for_path(&path, connector, &options).await?;
            let key = complete_key(&entity, &path)?;
            entity.set_key(Some(key.clone()));
            entity.delete().await?;
            tracing::info!(key = %key, "Deleted entity");
            Ok(render_keys(&[key], format))
        }

        Command::AllocateIds { count, path } => {
            let entity = entity_for_path(&path, connector, &options).await?;
            let incomplete = entity.generate_key(parse_path(&path))?;
            if incomplete.is_complete() {
                bail!("key {incomplete} already has an id, end the path with a kind");
            }
            let keys = entity.allocate_ids(&incomplete, count).await?;
            Ok(render_keys(&keys, format))
        }
    }
}

/// Connect an entity whose kind is the last kind named in `path`.
async fn entity_for_path(
    path: &[String],
    connector: &dyn Connector,
    options: &ConnectOptions,
) -> Result<Entity> {
    let key = Key::from_path(parse_path(path))?;
    Ok(Entity::connected(Schema::new(key.kind()), connector, options).await?)
}

/// Build a key from `path` in the entity's namespace, requiring an id.
fn complete_key(entity: &Entity, path: &[String]) -> Result<Key> {
    let key = entity.generate_key(parse_path(path))?;
    if !key.is_complete() {
        bail!("key {key} has no id");
    }
    Ok(key)
}

fn key_id(input: &str) -> KeyId {
    match PathPart::parse(input) {
        PathPart::Id(id) => KeyId::Id(id),
        PathPart::Text(name) => KeyId::Name(name),
    }
}

/// Parse `--props` into property name/value pairs.
fn parse_props(input: &str) -> Result<Vec<(String, Value)>> {
    let json: serde_json::Value =
        serde_json::from_str(input).context("--props must be a JSON object")?;
    match json {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect()),
        other => bail!("--props must be a JSON object, got {other}"),
    }
}
