//! A small read-it-later schema shared by the integration tests.
//!
//! Items (keyed by id, also findable by url) optionally embed their
//! Domain. Each owner has a Saves list whose `count` is derived.

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thingspace_core::codec::{ByteReader, ByteWriter, CodecError};
use thingspace_core::engine::{Engine, EngineConfig, RemoteSource, SyncPending};
use thingspace_core::model::{
    Action, Factory, JsonConfig, ParseError, Registry, RemotePriority, Thing, ThingKey, Variant,
};
use thingspace_core::pending::PendingResult;
use thingspace_core::result::{Status, SyncException, SyncResult};
use thingspace_core::space::{Diff, Resolver, Selector, Space};
use thingspace_core::spec::{Applied, ApplyError, Derive, FieldSet, Reactions, Spec};

// ----------------------------------------------------------------------
// Things
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Saved {
    Item {
        id: Option<String>,
        url: String,
        title: Option<String>,
        archived: Option<bool>,
        domain: Option<Box<Saved>>,
    },
    Domain {
        name: String,
        title: Option<String>,
    },
    Saves {
        owner: String,
        items: Vec<Saved>,
        count: Option<u32>,
    },
}

pub fn item(id: &str, url: &str) -> Saved {
    Saved::Item {
        id: Some(id.into()),
        url: url.into(),
        title: None,
        archived: None,
        domain: None,
    }
}

pub fn titled(id: &str, url: &str, title: &str) -> Saved {
    match item(id, url) {
        Saved::Item { id, url, archived, domain, .. } => Saved::Item {
            id,
            url,
            title: Some(title.into()),
            archived,
            domain,
        },
        other => other,
    }
}

/// An item known only by its url.
pub fn unresolved(url: &str) -> Saved {
    Saved::Item {
        id: None,
        url: url.into(),
        title: None,
        archived: None,
        domain: None,
    }
}

pub fn with_domain(thing: Saved, domain: Saved) -> Saved {
    match thing {
        Saved::Item { id, url, title, archived, .. } => Saved::Item {
            id,
            url,
            title,
            archived,
            domain: Some(Box::new(domain)),
        },
        other => other,
    }
}

pub fn domain(name: &str, title: Option<&str>) -> Saved {
    Saved::Domain {
        name: name.into(),
        title: title.map(Into::into),
    }
}

pub fn saves(owner: &str) -> Saved {
    Saved::Saves {
        owner: owner.into(),
        items: Vec::new(),
        count: None,
    }
}

pub fn item_key(id: &str) -> ThingKey {
    ThingKey::new("item", id)
}

pub fn saves_key(owner: &str) -> ThingKey {
    ThingKey::new("saves", owner)
}

impl Saved {
    pub fn title(&self) -> Option<&str> {
        match self {
            Saved::Item { title, .. } | Saved::Domain { title, .. } => title.as_deref(),
            Saved::Saves { .. } => None,
        }
    }

    pub fn is_archived(&self) -> bool {
        matches!(self, Saved::Item { archived: Some(true), .. })
    }

    pub fn count(&self) -> Option<u32> {
        match self {
            Saved::Saves { count, .. } => *count,
            _ => None,
        }
    }
}

impl Variant for Saved {
    fn variant(&self) -> &'static str {
        match self {
            Saved::Item { .. } => "item",
            Saved::Domain { .. } => "domain",
            Saved::Saves { .. } => "saves",
        }
    }

    fn to_json(&self, config: &JsonConfig) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            Saved::Item { id, url, title, archived, domain } => {
                map.insert("id".into(), json!(id));
                map.insert("url".into(), json!(url));
                map.insert("title".into(), json!(title));
                map.insert("archived".into(), json!(archived));
                if let Some(domain) = domain {
                    map.insert("domain".into(), things().to_json(domain, config));
                }
            }
            Saved::Domain { name, title } => {
                map.insert("name".into(), json!(name));
                map.insert("title".into(), json!(title));
            }
            Saved::Saves { owner, items, count } => {
                map.insert("owner".into(), json!(owner));
                let items: Vec<Value> = items.iter().map(|item| things().to_json(item, config)).collect();
                map.insert("items".into(), Value::Array(items));
                map.insert("count".into(), json!(count));
            }
        }
        map
    }

    fn compress(&self, writer: &mut ByteWriter) {
        match self {
            Saved::Item { id, url, title, archived, domain } => {
                writer.write_bit(id.is_some());
                writer.write_bit(title.is_some());
                writer.write_bit(archived.is_some());
                writer.write_bit(domain.is_some());
                writer.finish_byte();
                writer.write_string(url);
                if let Some(id) = id {
                    writer.write_string(id);
                }
                if let Some(title) = title {
                    writer.write_string(title);
                }
                if let Some(archived) = archived {
                    writer.write_boolean(*archived);
                }
                if let Some(domain) = domain {
                    things().write(domain, writer);
                }
            }
            Saved::Domain { name, title } => {
                writer.write_string(name);
                writer.write_bit(title.is_some());
                if let Some(title) = title {
                    writer.write_string(title);
                }
            }
            Saved::Saves { owner, items, count } => {
                writer.write_string(owner);
                writer.write_list(items, |writer, item| things().write(item, writer));
                writer.write_int(count.map_or(-1, |count| count as i32));
            }
        }
    }
}

impl Thing for Saved {
    fn key(&self) -> Option<ThingKey> {
        match self {
            Saved::Item { id, .. } => id.as_ref().map(|id| ThingKey::new("item", id.clone())),
            Saved::Domain { name, .. } => Some(ThingKey::new("domain", name.clone())),
            Saved::Saves { owner, .. } => Some(ThingKey::new("saves", owner.clone())),
        }
    }

    fn identity(&self) -> Self {
        match self {
            Saved::Item { id, url, .. } => Saved::Item {
                id: id.clone(),
                url: url.clone(),
                title: None,
                archived: None,
                domain: None,
            },
            Saved::Domain { name, .. } => domain(name, None),
            Saved::Saves { owner, .. } => saves(owner),
        }
    }

    fn merge(&self, newer: &Self) -> Self {
        match (self, newer) {
            (
                Saved::Item { id, title, archived, domain, .. },
                Saved::Item {
                    id: new_id,
                    url,
                    title: new_title,
                    archived: new_archived,
                    domain: new_domain,
                },
            ) => Saved::Item {
                id: new_id.clone().or_else(|| id.clone()),
                url: url.clone(),
                title: new_title.clone().or_else(|| title.clone()),
                archived: new_archived.or(*archived),
                domain: new_domain.clone().or_else(|| domain.clone()),
            },
            (Saved::Domain { title, .. }, Saved::Domain { name, title: new_title }) => Saved::Domain {
                name: name.clone(),
                title: new_title.clone().or_else(|| title.clone()),
            },
            (Saved::Saves { count, .. }, Saved::Saves { owner, items, count: new_count }) => Saved::Saves {
                owner: owner.clone(),
                items: items.clone(),
                count: new_count.or(*count),
            },
            (_, newer) => newer.clone(),
        }
    }

    fn subthings(&self, visitor: &mut dyn FnMut(&Self)) {
        match self {
            Saved::Item { domain: Some(domain), .. } => visitor(domain),
            Saved::Saves { items, .. } => items.iter().for_each(visitor),
            _ => {}
        }
    }

    fn map_children(&self, f: &mut dyn FnMut(&Self) -> Option<Self>) -> Option<Self> {
        match self {
            Saved::Item { id, url, title, archived, domain: Some(domain) } => {
                f(domain).map(|domain| Saved::Item {
                    id: id.clone(),
                    url: url.clone(),
                    title: title.clone(),
                    archived: *archived,
                    domain: Some(Box::new(domain)),
                })
            }
            Saved::Saves { owner, items, count } => {
                let mut changed = false;
                let items = items
                    .iter()
                    .map(|item| match f(item) {
                        Some(next) => {
                            changed = true;
                            next
                        }
                        None => item.clone(),
                    })
                    .collect();
                changed.then(|| Saved::Saves {
                    owner: owner.clone(),
                    items,
                    count: *count,
                })
            }
            _ => None,
        }
    }
}

fn field<'a>(map: &'a Map<String, Value>, variant: &'static str, field: &'static str) -> Result<&'a str, ParseError> {
    map.get(field)
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField { variant, field })
}

fn optional(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field).and_then(Value::as_str).map(str::to_owned)
}

pub fn things() -> Registry<Saved> {
    Registry::new("type")
        .register(
            "item",
            Factory {
                from_json: |map, config| {
                    let domain = match map.get("domain") {
                        Some(value @ Value::Object(_)) => Some(Box::new(things().parse(value, config)?)),
                        _ => None,
                    };
                    Ok(Saved::Item {
                        id: optional(map, "id"),
                        url: field(map, "item", "url")?.to_owned(),
                        title: optional(map, "title"),
                        archived: map.get("archived").and_then(Value::as_bool),
                        domain,
                    })
                },
                uncompress: |reader| {
                    let (has_id, has_title) = (reader.read_bit()?, reader.read_bit()?);
                    let (has_archived, has_domain) = (reader.read_bit()?, reader.read_bit()?);
                    reader.finish_byte();
                    let url = reader.read_string()?;
                    let id = if has_id { Some(reader.read_string()?) } else { None };
                    let title = if has_title { Some(reader.read_string()?) } else { None };
                    let archived = if has_archived { Some(reader.read_boolean()?) } else { None };
                    let domain = if has_domain { Some(Box::new(things().read(reader)?)) } else { None };
                    Ok(Saved::Item { id, url, title, archived, domain })
                },
            },
        )
        .register(
            "domain",
            Factory {
                from_json: |map, _| {
                    Ok(Saved::Domain {
                        name: field(map, "domain", "name")?.to_owned(),
                        title: optional(map, "title"),
                    })
                },
                uncompress: |reader| {
                    let name = reader.read_string()?;
                    let title = if reader.read_bit()? { Some(reader.read_string()?) } else { None };
                    Ok(Saved::Domain { name, title })
                },
            },
        )
        .register(
            "saves",
            Factory {
                from_json: |map, config| {
                    let items = match map.get("items") {
                        Some(Value::Array(values)) => values
                            .iter()
                            .map(|value| things().parse(value, config))
                            .collect::<Result<Vec<_>, _>>()?,
                        _ => Vec::new(),
                    };
                    Ok(Saved::Saves {
                        owner: field(map, "saves", "owner")?.to_owned(),
                        items,
                        count: map.get("count").and_then(Value::as_u64).map(|count| count as u32),
                    })
                },
                uncompress: |reader| {
                    let owner = reader.read_string()?;
                    let items = reader.read_list(|reader| things().read(reader))?;
                    let count = reader.read_int()?;
                    Ok(Saved::Saves {
                        owner,
                        items,
                        count: u32::try_from(count).ok(),
                    })
                },
            },
        )
}

// ----------------------------------------------------------------------
// Actions
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SaveAction {
    /// Add an item to an owner's list. Queued for the next flush.
    Save { time: i64, owner: String, item: Saved },
    /// Mark an item archived. Sent right away.
    Archive { time: i64, id: String },
    /// Local-only retitle.
    Rename { time: i64, id: String, title: String },
    /// Authenticate against the remote. Never applied locally.
    Login { time: i64, user: String, password: String },
    /// Change the unlock pin. Applied locally, synced soon, never queued.
    SetPin { time: i64, user: String, pin: String },
}

pub fn save(owner: &str, thing: Saved) -> SaveAction {
    SaveAction::Save { time: 1, owner: owner.into(), item: thing }
}

pub fn archive(id: &str) -> SaveAction {
    SaveAction::Archive { time: 2, id: id.into() }
}

pub fn rename(id: &str, title: &str) -> SaveAction {
    SaveAction::Rename { time: 3, id: id.into(), title: title.into() }
}

pub fn login(user: &str, password: &str) -> SaveAction {
    SaveAction::Login { time: 4, user: user.into(), password: password.into() }
}

pub fn set_pin(user: &str, pin: &str) -> SaveAction {
    SaveAction::SetPin { time: 5, user: user.into(), pin: pin.into() }
}

impl Variant for SaveAction {
    fn variant(&self) -> &'static str {
        match self {
            SaveAction::Save { .. } => "save",
            SaveAction::Archive { .. } => "archive",
            SaveAction::Rename { .. } => "rename",
            SaveAction::Login { .. } => "login",
            SaveAction::SetPin { .. } => "set_pin",
        }
    }

    fn to_json(&self, config: &JsonConfig) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("time".into(), json!(self.time()));
        match self {
            SaveAction::Save { owner, item, .. } => {
                map.insert("owner".into(), json!(owner));
                map.insert("item".into(), things().to_json(item, config));
            }
            SaveAction::Archive { id, .. } => {
                map.insert("id".into(), json!(id));
            }
            SaveAction::Rename { id, title, .. } => {
                map.insert("id".into(), json!(id));
                map.insert("title".into(), json!(title));
            }
            SaveAction::Login { user, password, .. } => {
                map.insert("user".into(), json!(user));
                map.insert("password".into(), config.sensitive(json!(password)));
            }
            SaveAction::SetPin { user, pin, .. } => {
                map.insert("user".into(), json!(user));
                map.insert("pin".into(), config.sensitive(json!(pin)));
            }
        }
        map
    }

    fn compress(&self, writer: &mut ByteWriter) {
        writer.write_long(self.time());
        match self {
            SaveAction::Save { owner, item, .. } => {
                writer.write_string(owner);
                things().write(item, writer);
            }
            SaveAction::Archive { id, .. } => writer.write_string(id),
            SaveAction::Rename { id, title, .. } => {
                writer.write_string(id);
                writer.write_string(title);
            }
            SaveAction::Login { user, password, .. } => {
                writer.write_string(user);
                writer.write_string(password);
            }
            SaveAction::SetPin { user, pin, .. } => {
                writer.write_string(user);
                writer.write_string(pin);
            }
        }
    }
}

impl Action for SaveAction {
    fn time(&self) -> i64 {
        match self {
            SaveAction::Save { time, .. }
            | SaveAction::Archive { time, .. }
            | SaveAction::Rename { time, .. }
            | SaveAction::Login { time, .. }
            | SaveAction::SetPin { time, .. } => *time,
        }
    }

    fn priority(&self) -> RemotePriority {
        match self {
            SaveAction::Save { .. } => RemotePriority::Soon,
            SaveAction::Archive { .. } => RemotePriority::Asap,
            SaveAction::Rename { .. } => RemotePriority::Local,
            SaveAction::Login { .. } => RemotePriority::Remote,
            SaveAction::SetPin { .. } => RemotePriority::Soon,
        }
    }

    fn has_credentials(&self) -> bool {
        matches!(self, SaveAction::Login { .. } | SaveAction::SetPin { .. })
    }
}

pub fn actions() -> Registry<SaveAction> {
    fn time(map: &Map<String, Value>) -> i64 {
        map.get("time").and_then(Value::as_i64).unwrap_or_default()
    }

    Registry::new("action")
        .register(
            "save",
            Factory {
                from_json: |map, config| {
                    let item = map.get("item").ok_or(ParseError::MissingField {
                        variant: "save",
                        field: "item",
                    })?;
                    Ok(SaveAction::Save {
                        time: time(map),
                        owner: field(map, "save", "owner")?.to_owned(),
                        item: things().parse(item, config)?,
                    })
                },
                uncompress: |reader| {
                    Ok(SaveAction::Save {
                        time: reader.read_long()?,
                        owner: reader.read_string()?,
                        item: things().read(reader)?,
                    })
                },
            },
        )
        .register(
            "archive",
            Factory {
                from_json: |map, _| {
                    Ok(SaveAction::Archive {
                        time: time(map),
                        id: field(map, "archive", "id")?.to_owned(),
                    })
                },
                uncompress: |reader| {
                    Ok(SaveAction::Archive {
                        time: reader.read_long()?,
                        id: reader.read_string()?,
                    })
                },
            },
        )
        .register(
            "rename",
            Factory {
                from_json: |map, _| {
                    Ok(SaveAction::Rename {
                        time: time(map),
                        id: field(map, "rename", "id")?.to_owned(),
                        title: field(map, "rename", "title")?.to_owned(),
                    })
                },
                uncompress: |reader| {
                    Ok(SaveAction::Rename {
                        time: reader.read_long()?,
                        id: reader.read_string()?,
                        title: reader.read_string()?,
                    })
                },
            },
        )
        .register(
            "login",
            Factory {
                from_json: |map, _| {
                    Ok(SaveAction::Login {
                        time: time(map),
                        user: field(map, "login", "user")?.to_owned(),
                        password: field(map, "login", "password")?.to_owned(),
                    })
                },
                uncompress: |reader| {
                    Ok(SaveAction::Login {
                        time: reader.read_long()?,
                        user: reader.read_string()?,
                        password: reader.read_string()?,
                    })
                },
            },
        )
        .register(
            "set_pin",
            Factory {
                from_json: |map, _| {
                    Ok(SaveAction::SetPin {
                        time: time(map),
                        user: field(map, "set_pin", "user")?.to_owned(),
                        pin: field(map, "set_pin", "pin")?.to_owned(),
                    })
                },
                uncompress: |reader| {
                    Ok(SaveAction::SetPin {
                        time: reader.read_long()?,
                        user: reader.read_string()?,
                        pin: reader.read_string()?,
                    })
                },
            },
        )
}

// ----------------------------------------------------------------------
// Domain logic
// ----------------------------------------------------------------------

/// Fills in an item's id from a stored item with the same url.
pub struct UrlResolver;

impl Resolver<Saved> for UrlResolver {
    fn resolve(&self, thing: &Saved, selector: &dyn Selector<Saved>) -> Option<Saved> {
        if thing.key().is_some() {
            return Some(thing.clone());
        }
        let Saved::Item { url, .. } = thing else {
            return None;
        };
        let found = selector
            .select_where(&mut |stored| matches!(stored, Saved::Item { url: stored_url, .. } if stored_url == url))
            .into_iter()
            .next()?;
        let Saved::Item { id, .. } = found else {
            return None;
        };
        match thing {
            Saved::Item { url, title, archived, domain, .. } => Some(Saved::Item {
                id: id.clone(),
                url: url.clone(),
                title: title.clone(),
                archived: *archived,
                domain: domain.clone(),
            }),
            _ => None,
        }
    }
}

/// Keeps `Saves.count` equal to the number of items, and derives empty
/// lists for unknown owners.
pub struct CountDerive;

impl Derive<Saved> for CountDerive {
    fn derive(&self, thing: &Saved, _selector: &dyn Selector<Saved>) -> Option<Saved> {
        match thing {
            Saved::Saves { owner, .. } => Some(Saved::Saves {
                owner: owner.clone(),
                items: Vec::new(),
                count: Some(0),
            }),
            _ => None,
        }
    }

    fn reactions(&self, diff: &Diff<Saved>, reactions: &mut Reactions) {
        if diff.of_type("saves").next().is_some() {
            reactions.react_type("saves", FieldSet::of(&["count"]));
        }
    }

    fn rederive(
        &self,
        thing: &Saved,
        fields: &FieldSet,
        _diff: &Diff<Saved>,
        _selector: &dyn Selector<Saved>,
    ) -> Option<Saved> {
        let Saved::Saves { owner, items, count } = thing else {
            return None;
        };
        let actual = items.len() as u32;
        (fields.contains("count") && *count != Some(actual)).then(|| Saved::Saves {
            owner: owner.clone(),
            items: items.clone(),
            count: Some(actual),
        })
    }
}

pub struct SavesSpec {
    things: Registry<Saved>,
    actions: Registry<SaveAction>,
}

impl SavesSpec {
    pub fn new() -> Self {
        Self {
            things: things(),
            actions: actions(),
        }
    }

    fn stored_item(space: &Space<Saved>, id: &str, action: &'static str) -> Result<Saved, ApplyError> {
        space
            .get(&item_key(id))
            .cloned()
            .ok_or_else(|| ApplyError::failed(action, "item is not known yet"))
    }
}

impl Spec for SavesSpec {
    type Thing = Saved;
    type Action = SaveAction;

    fn things(&self) -> &Registry<Saved> {
        &self.things
    }

    fn actions(&self) -> &Registry<SaveAction> {
        &self.actions
    }

    fn apply(
        &self,
        action: &SaveAction,
        space: &mut Space<Saved>,
        _remote: Option<&dyn RemoteSource<Saved, SaveAction>>,
    ) -> Result<Applied, ApplyError> {
        match action {
            SaveAction::Save { owner, item, .. } => {
                let key = item.key().ok_or_else(|| ApplyError::rejected("save", "item has no id"))?;
                space.imprint(item)?;
                let current = space.get(&saves_key(owner)).cloned().unwrap_or_else(|| saves(owner));
                let Saved::Saves { items, count, .. } = current else {
                    return Err(ApplyError::rejected("save", "not a list"));
                };
                if items.iter().any(|saved| saved.key().as_ref() == Some(&key)) {
                    return Ok(Applied::Ignored);
                }
                let mut items = items;
                items.push(item.clone());
                space.imprint(&Saved::Saves { owner: owner.clone(), items, count })?;
                Ok(Applied::Done)
            }
            SaveAction::Archive { id, .. } => {
                let stored = Self::stored_item(space, id, "archive")?;
                if stored.is_archived() {
                    return Ok(Applied::Ignored);
                }
                let Saved::Item { id, url, title, domain, .. } = stored else {
                    return Err(ApplyError::rejected("archive", "not an item"));
                };
                space.imprint(&Saved::Item { id, url, title, archived: Some(true), domain })?;
                Ok(Applied::Done)
            }
            SaveAction::Rename { id, title, .. } => {
                let stored = space
                    .get(&item_key(id))
                    .cloned()
                    .ok_or_else(|| ApplyError::rejected("rename", "no such item"))?;
                if stored.title() == Some(title.as_str()) {
                    return Ok(Applied::Ignored);
                }
                space.imprint(&titled(id, &url_of(&stored), title))?;
                Ok(Applied::Done)
            }
            SaveAction::Login { .. } => Err(ApplyError::Unsupported { action: "login" }),
            SaveAction::SetPin { .. } => Ok(Applied::Done),
        }
    }

    fn derive(&self) -> &dyn Derive<Saved> {
        &CountDerive
    }

    fn resolver(&self) -> &dyn Resolver<Saved> {
        &UrlResolver
    }
}

fn url_of(thing: &Saved) -> String {
    match thing {
        Saved::Item { url, .. } => url.clone(),
        _ => String::new(),
    }
}

// ----------------------------------------------------------------------
// Remote
// ----------------------------------------------------------------------

pub type Outcome = Result<SyncResult<Saved, SaveAction>, SyncException<Saved, SaveAction>>;
type Responder = dyn Fn(Option<&Saved>, &[SaveAction]) -> Outcome + Send + Sync;

/// A scripted remote that answers from another thread.
pub struct MockRemote {
    calls: Mutex<Vec<(Option<Saved>, Vec<SaveAction>)>>,
    responder: Box<Responder>,
}

impl MockRemote {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(Option<&Saved>, &[SaveAction]) -> Outcome + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// Accepts every action and echoes the requested Thing back.
    pub fn accepting() -> Arc<Self> {
        Self::new(|thing, actions| {
            let mut builder = SyncResult::builder(thing.cloned(), actions.to_vec());
            if let Some(thing) = thing {
                builder.result(thing.clone());
            }
            Ok(builder.build(Status::Success))
        })
    }

    pub fn calls(&self) -> Vec<(Option<Saved>, Vec<SaveAction>)> {
        self.calls.lock().clone()
    }

    pub fn sent_actions(&self) -> Vec<SaveAction> {
        self.calls.lock().iter().flat_map(|(_, actions)| actions.clone()).collect()
    }
}

impl RemoteSource<Saved, SaveAction> for MockRemote {
    fn sync(&self, thing: Option<Saved>, actions: Vec<SaveAction>) -> SyncPending<Saved, SaveAction> {
        let outcome = (self.responder)(thing.as_ref(), &actions);
        self.calls.lock().push((thing, actions));

        let pending = PendingResult::new();
        let resolver = pending.clone();
        thread::spawn(move || match outcome {
            Ok(result) => resolver.success(result),
            Err(exception) => resolver.fail(exception),
        });
        pending
    }
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

pub fn local_engine() -> Engine<SavesSpec> {
    Engine::local(SavesSpec::new(), EngineConfig::default()).expect("engine starts")
}

pub fn remote_engine(remote: &Arc<MockRemote>) -> Engine<SavesSpec> {
    let remote: Arc<dyn RemoteSource<Saved, SaveAction>> = Arc::clone(remote) as _;
    Engine::new(SavesSpec::new(), EngineConfig::default(), Some(remote)).expect("engine starts")
}

/// Block until `pending` resolves.
pub fn wait<T, E>(pending: &PendingResult<T, E>) -> Result<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pending.get().expect("result was abandoned")
}

/// Poll `condition` for up to a second.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Wait for the engine to run everything queued so far.
pub fn settle(engine: &Engine<SavesSpec>) {
    wait(&engine.barrier()).expect("barrier");
}

pub fn codec_roundtrip(thing: &Saved) -> Result<Saved, CodecError> {
    let registry = things();
    let bytes = registry.compress(thing);
    let mut reader = ByteReader::new(&bytes);
    let decoded = registry.read(&mut reader)?;
    assert!(reader.is_empty(), "trailing bytes");
    Ok(decoded)
}
