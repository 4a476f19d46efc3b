//! Terminal harness: drives the dispatcher against a JSON world file.
//!
//! ```text
//! scriptable-items [--world world.json] [--role gamemaster] [--lua] <command> <item> [args...]
//! ```

use std::collections::VecDeque;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptable_items::authoring::Authoring;
use scriptable_items::card::card_buttons;
use scriptable_items::error::HostError;
use scriptable_items::host::{
    ActorDoc, ActorInventory, ChatCard, Host, ItemDoc, NoticeLevel, Speaker, TokenDoc, UseOptions,
};
use scriptable_items::linked::{LinkedItems, LinkedRef, LinkedSource};
use scriptable_items::prompt::{ChoicePrompt, ChoiceRequest, ConfirmPrompt};
use scriptable_items::record::{random_id, ScriptPatch};
use scriptable_items::scripting::{RhaiEngine, ScriptEngine};
use scriptable_items::{Dispatch, Dispatcher, JsonFileFlags, Settings, UserRole};

const USAGE: &str = "usage: scriptable-items [--world <file>] [--role <role>] [--lua] <command> <item> [args...]

commands:
  list <item>                   scripts on the item
  create <item>                 add a default script
  edit <item> <id> <patch>      apply a JSON patch (name, img, command, triggers)
  exec <item> <id> [patch]      save then run with the debug trigger
  delete <item> <id>            delete after confirmation
  use <item>                    use the item (pre-use scripts)
  add <item> | remove <item>    item entered or left its actor's holdings
  buttons <item>                run buttons for the item's card
  click <item> <id>             click a card run button
  link <item> <refs...>         grant linked items to the item's actor
  unlink <item> [refs...]       take linked items away again";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct World {
    items: Vec<ItemDoc>,
    actors: Vec<ActorDoc>,
    tokens: Vec<TokenDoc>,
    /// Actor id of the local user's persona.
    character: Option<String>,
}

/// Host over an in-memory world. Re-entered uses are queued and drained by
/// the command loop.
struct WorldHost {
    world: Mutex<World>,
    pending: Mutex<VecDeque<(ItemDoc, Value, UseOptions)>>,
}

impl WorldHost {
    fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let world = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => World::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            world: Mutex::new(world),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    fn save(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::write(path, serde_json::to_string_pretty(&*world)?)?;
        Ok(())
    }

    /// Any item in the world, owned or not, by id, name or uuid.
    fn find_item(&self, reference: &str) -> Option<ItemDoc> {
        let world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        world
            .items
            .iter()
            .find(|i| i.id == reference || i.uuid == reference)
            .or_else(|| world.items.iter().find(|i| i.name == reference))
            .cloned()
    }

    fn next_use(&self) -> Option<(ItemDoc, Value, UseOptions)> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl Host for WorldHost {
    fn speaker_for(&self, item: &ItemDoc) -> Speaker {
        let world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        let actor = item
            .actor_id
            .as_deref()
            .and_then(|id| world.actors.iter().find(|a| a.id == id));
        let token = actor.and_then(|actor| {
            world
                .tokens
                .iter()
                .find(|t| t.actor_id.as_deref() == Some(actor.id.as_str()))
        });
        Speaker {
            scene: None,
            actor: actor.map(|a| a.id.clone()),
            token: token.map(|t| t.id.clone()),
            alias: Some(actor.map_or_else(|| item.name.clone(), |a| a.name.clone())),
        }
    }

    fn canvas_token(&self, token_id: &str) -> Option<TokenDoc> {
        let world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        world.tokens.iter().find(|t| t.id == token_id).cloned()
    }

    fn actor(&self, actor_id: &str) -> Option<ActorDoc> {
        let world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        world.actors.iter().find(|a| a.id == actor_id).cloned()
    }

    fn user_character(&self) -> Option<ActorDoc> {
        let id = self
            .world
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .character
            .clone()?;
        self.actor(&id)
    }

    async fn resolve_item(&self, reference: &str) -> Option<ItemDoc> {
        let world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        let unowned = || world.items.iter().filter(|i| i.actor_id.is_none());
        unowned()
            .find(|i| i.id == reference)
            .or_else(|| unowned().find(|i| i.name == reference))
            .or_else(|| world.items.iter().find(|i| i.uuid == reference))
            .cloned()
    }

    async fn use_item(
        &self,
        item: &ItemDoc,
        config: &Value,
        options: UseOptions,
    ) -> Result<(), HostError> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((item.clone(), config.clone(), options));
        Ok(())
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warn => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {message}");
    }
}

#[async_trait]
impl ActorInventory for WorldHost {
    async fn create_owned_item(&self, actor_id: &str, data: Value) -> Result<ItemDoc, HostError> {
        if self.actor(actor_id).is_none() {
            return Err(HostError::NotFound {
                kind: "actor",
                reference: actor_id.to_string(),
            });
        }
        let id = random_id();
        let created = ItemDoc {
            uuid: format!("Actor.{actor_id}.Item.{id}"),
            name: data
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Item")
                .to_string(),
            system: data.get("system").cloned().unwrap_or(Value::Null),
            actor_id: Some(actor_id.to_string()),
            id,
        };
        self.world
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .items
            .push(created.clone());
        Ok(created)
    }

    fn owned_item(&self, actor_id: &str, reference: &str) -> Option<ItemDoc> {
        let world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        let owned = || {
            world
                .items
                .iter()
                .filter(|i| i.actor_id.as_deref() == Some(actor_id))
        };
        owned()
            .find(|i| i.id == reference)
            .or_else(|| owned().find(|i| i.name == reference))
            .cloned()
    }

    async fn delete_owned_item(&self, actor_id: &str, item_id: &str) -> Result<(), HostError> {
        let mut world = self.world.lock().unwrap_or_else(|e| e.into_inner());
        let before = world.items.len();
        world
            .items
            .retain(|i| !(i.id == item_id && i.actor_id.as_deref() == Some(actor_id)));
        if world.items.len() == before {
            return Err(HostError::NotFound {
                kind: "item",
                reference: item_id.to_string(),
            });
        }
        Ok(())
    }
}

async fn read_line(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        print!("{prompt}");
        std::io::stdout().flush().ok()?;
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    })
    .await
    .ok()
    .flatten()
}

/// Numbered menu on stdin. Empty input takes the default, `q` dismisses.
struct TerminalPrompt;

#[async_trait]
impl ChoicePrompt for TerminalPrompt {
    async fn choose(&self, request: ChoiceRequest) -> Option<String> {
        println!("{}\n{}", request.title, request.prompt);
        for (n, choice) in request.choices.iter().enumerate() {
            let marker = if choice.id == request.default { "*" } else { " " };
            println!("{marker}{}) {} [{}]", n + 1, choice.label, choice.id);
        }
        let answer = read_line("> ".to_string()).await?;
        if answer.is_empty() {
            return Some(request.default);
        }
        let index = answer.parse::<usize>().ok()?.checked_sub(1)?;
        request.choices.get(index).map(|c| c.id.clone())
    }
}

#[async_trait]
impl ConfirmPrompt for TerminalPrompt {
    async fn confirm(&self, title: &str, content: &str) -> bool {
        println!("{title}\n{content}");
        matches!(
            read_line("[y/N] ".to_string()).await.as_deref(),
            Some("y" | "Y" | "yes")
        )
    }
}

struct Options {
    world: PathBuf,
    role: UserRole,
    lua: bool,
    rest: Vec<String>,
}

fn parse_args(args: Vec<String>) -> Result<Options, String> {
    let mut options = Options {
        world: std::env::var("SCRIPTABLE_ITEMS_WORLD")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "world.json".to_string())
            .into(),
        role: UserRole::Gamemaster,
        lua: false,
        rest: Vec::new(),
    };
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--world" => options.world = args.next().ok_or("--world needs a path")?.into(),
            "--role" => {
                let role = args.next().ok_or("--role needs a value")?;
                options.role = serde_json::from_value(Value::String(role.to_lowercase()))
                    .map_err(|_| format!("unknown role `{role}`"))?;
            }
            "--lua" => options.lua = true,
            _ => options.rest.push(arg),
        }
    }
    Ok(options)
}

fn make_engine(settings: &Settings, lua: bool) -> Result<Arc<dyn ScriptEngine>, String> {
    if lua {
        #[cfg(feature = "lua")]
        return Ok(Arc::new(scriptable_items::scripting::LuaEngine::from_settings(settings)));
        #[cfg(not(feature = "lua"))]
        return Err("built without the `lua` feature".to_string());
    }
    Ok(Arc::new(RhaiEngine::from_settings(settings)))
}

fn parse_patch(raw: Option<&String>) -> Result<ScriptPatch, Box<dyn std::error::Error>> {
    Ok(match raw {
        Some(raw) => serde_json::from_str(raw)?,
        None => ScriptPatch::default(),
    })
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::error!(error = %e, "failed to render output"),
    }
}

async fn run(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load();
    let flags_path = std::env::var("SCRIPTABLE_ITEMS_FLAGS")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "scriptable-items-flags.json".to_string());
    let flags = Arc::new(JsonFileFlags::new(flags_path));
    let host = Arc::new(WorldHost::load(&options.world)?);
    let prompt = Arc::new(TerminalPrompt);
    let engine = make_engine(&settings, options.lua)?;
    tracing::info!(engine = engine.name(), world = %options.world.display(), "harness ready");

    let dispatcher = Dispatcher::new(flags.clone(), host.clone(), prompt.clone(), engine);
    let authoring = Authoring::new(host.clone(), prompt, settings.clone());

    let [command, item_ref, rest @ ..] = options.rest.as_slice() else {
        return Err(USAGE.into());
    };
    let Some(item) = host.find_item(item_ref) else {
        return Err(format!("item not found: {item_ref}").into());
    };
    let store = dispatcher.store_for(&item);

    let authoring_command = matches!(command.as_str(), "create" | "edit" | "exec" | "delete");
    if authoring_command && !authoring.can_manage(options.role) {
        return Err("your role may not manage scripts".into());
    }

    match command.as_str() {
        "list" => print_json(&authoring.summaries(&store).await?),
        "create" => print_json(&authoring.create_default(&store).await?.id),
        "edit" => {
            let id = rest.first().ok_or(USAGE)?;
            if let Some(saved) = authoring.submit(&store, id, parse_patch(rest.get(1))?).await? {
                print_json(&saved.to_persistable());
            }
        }
        "exec" => {
            let id = rest.first().ok_or(USAGE)?;
            let patch = parse_patch(rest.get(1))?;
            let out = authoring
                .save_and_execute(&store, dispatcher.executor(), &item, id, patch)
                .await?;
            print_json(&out);
        }
        "delete" => {
            let id = rest.first().ok_or(USAGE)?;
            println!("deleted: {}", authoring.delete(&store, id).await?);
        }
        "use" => {
            let mut proceed = dispatcher
                .on_pre_use(&item, &Value::Null, &mut UseOptions::default())
                .await?;
            report_use(&item, proceed);
            while let Some((item, config, mut use_options)) = host.next_use() {
                proceed = dispatcher.on_pre_use(&item, &config, &mut use_options).await?;
                report_use(&item, proceed);
            }
        }
        "add" => report_dispatch(dispatcher.on_add_to_actor(&item, true).await?),
        "remove" => report_dispatch(dispatcher.on_remove_from_actor(&item, true).await?),
        "buttons" => print_json(&card_buttons(&store, &settings).await?),
        "click" => {
            let id = rest.first().ok_or(USAGE)?;
            let card = ChatCard {
                id: random_id(),
                item_uuid: Some(item.uuid.clone()),
                speaker: host.speaker_for(&item),
                content: String::new(),
            };
            report_dispatch(dispatcher.on_card_button(&card, id).await?);
        }
        "link" => {
            let sources = rest.iter().cloned().map(LinkedSource::Reference).collect();
            let linked = LinkedItems::new(flags.clone(), host.clone(), host.clone());
            let created = linked.add(&item, sources).await?;
            host.save(&options.world)?;
            print_json(&created);
        }
        "unlink" => {
            let refs = rest.iter().cloned().map(LinkedRef::Reference).collect();
            let linked = LinkedItems::new(flags.clone(), host.clone(), host.clone());
            let removed = linked.remove(&item, refs).await?;
            host.save(&options.world)?;
            println!("removed: {removed}");
        }
        _ => return Err(USAGE.into()),
    }
    Ok(())
}

fn report_use(item: &ItemDoc, proceed: bool) {
    if proceed {
        println!("{} used", item.name);
    } else {
        println!("{} use handled by script", item.name);
    }
}

fn report_dispatch(dispatch: Dispatch) {
    match dispatch {
        Dispatch::Skipped => println!("no script ran"),
        Dispatch::Ran { script_id, result } => {
            println!("ran {script_id}");
            print_json(&result);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scriptable_items=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = match parse_args(std::env::args().collect()) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };
    if let Err(e) = run(options).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
