//! Built-in actions.
//!
//! Each tool validates its own arguments and describes its effect as a
//! JSON object; the game engine decides what the effect means.

use serde_json::{json, Map, Value};

use anima_llm::ToolSpec;

use super::{ActionResult, ToolContext};

/// Name of the no-op fallback action.
pub const WAIT: &str = "wait";

const TONES: &[&str] = &["calm", "angry", "friendly", "serious", "excited", "worried", "neutral"];
const ATTACK_TYPES: &[&str] = &["melee", "ranged", "magic"];
const DEFENSE_TYPES: &[&str] = &["block", "dodge", "shield", "parry"];
const INTENSITIES: &[&str] = &["light", "medium", "heavy"];
const QUEST_STATUSES: &[&str] = &["in_progress", "completed", "failed", "cancelled"];

/// The closed set of built-in actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTool {
    /// Speak to another character.
    Talk,
    /// Walk to a location.
    MoveTo,
    /// Attack a character.
    Attack,
    /// Defend against an attack.
    Defend,
    /// Hand a quest to a character.
    StartQuest,
    /// Change a quest's status.
    UpdateQuest,
    /// Give an item away.
    GiveItem,
    /// Propose an item exchange.
    Trade,
    /// Do nothing this turn.
    Wait,
}

impl BuiltinTool {
    /// Every built-in, in registration order.
    pub const ALL: [BuiltinTool; 9] = [
        Self::Talk,
        Self::MoveTo,
        Self::Attack,
        Self::Defend,
        Self::StartQuest,
        Self::UpdateQuest,
        Self::GiveItem,
        Self::Trade,
        Self::Wait,
    ];

    /// Tool name as offered to the model.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Talk => "talk",
            Self::MoveTo => "move_to",
            Self::Attack => "attack",
            Self::Defend => "defend",
            Self::StartQuest => "start_quest",
            Self::UpdateQuest => "update_quest",
            Self::GiveItem => "give_item",
            Self::Trade => "trade",
            Self::Wait => WAIT,
        }
    }

    /// Look a built-in up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Self::Talk => "Speak to another character in the game world. Use this when verbal interaction is appropriate. Always provide the exact dialogue the NPC will say.",
            Self::MoveTo => "Move to a specific location in the game world. Use this when the NPC needs to change location.",
            Self::Attack => "Attack another character. Use this when combat is necessary and appropriate. Only use in combat situations.",
            Self::Defend => "Defend against incoming attacks. Use this when the NPC is under attack and needs to protect themselves.",
            Self::StartQuest => "Start a new quest for a target character. Use this when the NPC wants to assign a quest or task to another character.",
            Self::UpdateQuest => "Update the progress or status of an existing quest. Use this when quest objectives are completed or quest status changes.",
            Self::GiveItem => "Give an item to another character. Use this when the NPC wants to transfer an item to someone else.",
            Self::Trade => "Trade items with another character. Use this when the NPC wants to exchange items with someone else.",
            Self::Wait => "Wait and do nothing. Use this when the NPC should not take any action in this turn, or when waiting is the appropriate response.",
        }
    }

    fn parameters(self) -> Value {
        let item = json!({
            "type": "object",
            "properties": {
                "item_id": {"type": "string"},
                "item_name": {"type": "string"},
                "quantity": {"type": "integer", "minimum": 1}
            },
            "required": ["item_id", "item_name"]
        });
        match self {
            Self::Talk => json!({
                "type": "object",
                "properties": {
                    "target_id": {"type": "string", "description": "ID of the character being spoken to (e.g., player_001, npc_002)."},
                    "utterance": {"type": "string", "description": "The exact dialogue spoken by the NPC. Must be a complete sentence or phrase."},
                    "tone": {"type": "string", "description": "Emotional tone of the speech.", "enum": TONES}
                },
                "required": ["target_id", "utterance"]
            }),
            Self::MoveTo => json!({
                "type": "object",
                "properties": {
                    "location_id": {"type": "string", "description": "ID or name of the destination."},
                    "reason": {"type": "string", "description": "Reason for moving to this location (optional, for logging)."}
                },
                "required": ["location_id"]
            }),
            Self::Attack => json!({
                "type": "object",
                "properties": {
                    "target_id": {"type": "string", "description": "ID of the character being attacked."},
                    "attack_type": {"type": "string", "description": "Type of attack.", "enum": ATTACK_TYPES},
                    "intensity": {"type": "string", "description": "Intensity of the attack.", "enum": INTENSITIES}
                },
                "required": ["target_id", "attack_type"]
            }),
            Self::Defend => json!({
                "type": "object",
                "properties": {
                    "defense_type": {"type": "string", "description": "Type of defense.", "enum": DEFENSE_TYPES},
                    "intensity": {"type": "string", "description": "Intensity of the defense.", "enum": INTENSITIES}
                },
                "required": ["defense_type"]
            }),
            Self::StartQuest => json!({
                "type": "object",
                "properties": {
                    "target_id": {"type": "string", "description": "ID of the character receiving the quest."},
                    "quest_id": {"type": "string", "description": "Unique identifier for the quest."},
                    "quest_name": {"type": "string", "description": "Name of the quest."},
                    "quest_description": {"type": "string", "description": "Description of what needs to be done."},
                    "reward": {"type": "string", "description": "Reward for completing the quest (optional)."}
                },
                "required": ["target_id", "quest_id", "quest_name", "quest_description"]
            }),
            Self::UpdateQuest => json!({
                "type": "object",
                "properties": {
                    "quest_id": {"type": "string", "description": "ID of the quest to update."},
                    "status": {"type": "string", "description": "New status of the quest.", "enum": QUEST_STATUSES},
                    "progress_note": {"type": "string", "description": "Note about quest progress (optional)."}
                },
                "required": ["quest_id", "status"]
            }),
            Self::GiveItem => json!({
                "type": "object",
                "properties": {
                    "target_id": {"type": "string", "description": "ID of the character receiving the item."},
                    "item_id": {"type": "string", "description": "ID of the item being given."},
                    "item_name": {"type": "string", "description": "Name of the item."},
                    "quantity": {"type": "integer", "description": "Quantity of items to give.", "minimum": 1, "default": 1}
                },
                "required": ["target_id", "item_id", "item_name"]
            }),
            Self::Trade => json!({
                "type": "object",
                "properties": {
                    "target_id": {"type": "string", "description": "ID of the character to trade with."},
                    "offer_items": {"type": "array", "description": "Items the NPC is offering.", "items": item.clone()},
                    "request_items": {"type": "array", "description": "Items the NPC is requesting.", "items": item}
                },
                "required": ["target_id", "offer_items", "request_items"]
            }),
            Self::Wait => json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Reason for waiting (optional, for logging)."}
                },
                "required": []
            }),
        }
    }

    /// Function-calling schema.
    #[must_use]
    pub fn spec(self) -> ToolSpec {
        ToolSpec {
            name: self.name().into(),
            description: self.description().into(),
            parameters: self.parameters(),
        }
    }

    /// Validate `args` and describe the effect.
    #[must_use]
    pub fn execute(self, args: &Map<String, Value>, ctx: &ToolContext) -> ActionResult {
        let name = self.name();
        match self.effect(args, ctx) {
            Ok(effect) => ActionResult::ok(name, effect),
            Err(error) => ActionResult::failed(name, error),
        }
    }

    fn effect(self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<Map<String, Value>, String> {
        let npc = Value::String(ctx.npc_id.clone());
        let effect = match self {
            Self::Talk => {
                let (Some(target), Some(utterance)) = (arg(args, "target_id"), arg(args, "utterance")) else {
                    return Err("Missing required arguments: target_id, utterance".into());
                };
                let tone = choice(args, "tone", TONES, "neutral")?;
                json!({
                    "spoken": true,
                    "target": target,
                    "utterance": as_text(utterance),
                    "tone": tone,
                    "speaker": npc,
                })
            }
            Self::MoveTo => {
                let Some(location) = arg(args, "location_id") else {
                    return Err("Missing required argument: location_id".into());
                };
                json!({
                    "moved": true,
                    "from_location": ctx.current_location,
                    "to_location": location,
                    "npc_id": npc,
                })
            }
            Self::Attack => {
                let (Some(target), Some(_)) = (arg(args, "target_id"), arg(args, "attack_type")) else {
                    return Err("Missing required arguments: target_id and attack_type".into());
                };
                json!({
                    "attacked": true,
                    "attacker": npc,
                    "target": target,
                    "attack_type": choice(args, "attack_type", ATTACK_TYPES, "")?,
                    "intensity": choice(args, "intensity", INTENSITIES, "medium")?,
                })
            }
            Self::Defend => {
                if arg(args, "defense_type").is_none() {
                    return Err("Missing required argument: defense_type".into());
                }
                json!({
                    "defended": true,
                    "defender": npc,
                    "defense_type": choice(args, "defense_type", DEFENSE_TYPES, "")?,
                    "intensity": choice(args, "intensity", INTENSITIES, "medium")?,
                })
            }
            Self::StartQuest => {
                let (Some(target), Some(quest_id), Some(quest_name), Some(description)) = (
                    arg(args, "target_id"),
                    arg(args, "quest_id"),
                    arg(args, "quest_name"),
                    arg(args, "quest_description"),
                ) else {
                    return Err(
                        "Missing required arguments: target_id, quest_id, quest_name, quest_description".into(),
                    );
                };
                json!({
                    "quest_started": true,
                    "quest_id": quest_id,
                    "quest_name": quest_name,
                    "quest_giver": npc,
                    "quest_receiver": target,
                    "quest_description": description,
                    "reward": args.get("reward").cloned().unwrap_or_else(|| json!("")),
                })
            }
            Self::UpdateQuest => {
                let (Some(quest_id), Some(_)) = (arg(args, "quest_id"), arg(args, "status")) else {
                    return Err("Missing required arguments: quest_id and status".into());
                };
                json!({
                    "quest_updated": true,
                    "quest_id": quest_id,
                    "new_status": choice(args, "status", QUEST_STATUSES, "")?,
                    "updated_by": npc,
                    "progress_note": args.get("progress_note").cloned().unwrap_or_else(|| json!("")),
                })
            }
            Self::GiveItem => {
                let (Some(target), Some(item_id), Some(item_name)) =
                    (arg(args, "target_id"), arg(args, "item_id"), arg(args, "item_name"))
                else {
                    return Err("Missing required arguments: target_id, item_id, item_name".into());
                };
                json!({
                    "item_given": true,
                    "giver": npc,
                    "receiver": target,
                    "item_id": item_id,
                    "item_name": item_name,
                    "quantity": quantity(args.get("quantity"))?,
                })
            }
            Self::Trade => {
                let (Some(target), Some(offer), Some(request)) =
                    (arg(args, "target_id"), arg(args, "offer_items"), arg(args, "request_items"))
                else {
                    return Err("Missing required arguments: target_id, offer_items, request_items".into());
                };
                json!({
                    "trade_initiated": true,
                    "trader": npc,
                    "trade_partner": target,
                    "offer_items": items(offer, "offer_items")?,
                    "request_items": items(request, "request_items")?,
                })
            }
            Self::Wait => json!({
                "waited": true,
                "npc_id": npc,
                "reason": arg(args, "reason").cloned().unwrap_or_else(|| json!("No action needed")),
            }),
        };
        match effect {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// A supplied, non-empty argument value.
fn arg<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    })
}

fn as_text(v: &Value) -> Value {
    match v {
        Value::String(_) => v.clone(),
        other => Value::String(other.to_string()),
    }
}

/// An enum-valued argument; absent means `default`.
fn choice(args: &Map<String, Value>, key: &str, allowed: &[&str], default: &str) -> Result<Value, String> {
    let Some(value) = arg(args, key) else {
        return Ok(Value::String(default.into()));
    };
    match value.as_str() {
        Some(s) if allowed.contains(&s) => Ok(Value::String(s.into())),
        _ => Err(format!(
            "Invalid {key} {value}; expected one of: {}",
            allowed.join(", ")
        )),
    }
}

fn quantity(value: Option<&Value>) -> Result<Value, String> {
    match value {
        None | Some(Value::Null) => Ok(json!(1)),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => Ok(json!(n)),
            _ => Err(format!("Invalid quantity {v}; expected an integer of at least 1")),
        },
    }
}

fn items(value: &Value, key: &str) -> Result<Value, String> {
    let Some(list) = value.as_array() else {
        return Err(format!("{key} must be a list of items"));
    };
    for entry in list {
        let valid = entry.as_object().is_some_and(|o| {
            arg(o, "item_id").is_some() && arg(o, "item_name").is_some()
        });
        if !valid {
            return Err(format!("Each entry in {key} needs item_id and item_name"));
        }
        if let Some(q) = entry.get("quantity") {
            quantity(Some(q))?;
        }
    }
    Ok(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext {
            npc_id: "npc_1".into(),
            current_location: "gate".into(),
            world_id: "w1".into(),
            persona_id: "p1".into(),
        }
    }

    fn args(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn every_builtin_has_an_object_schema() {
        for tool in BuiltinTool::ALL {
            let spec = tool.spec();
            assert_eq!(spec.parameters["type"], "object", "{}", spec.name);
            assert!(!spec.description.is_empty());
            assert_eq!(BuiltinTool::from_name(&spec.name), Some(tool));
        }
    }

    #[test]
    fn talk_defaults_tone_and_names_speaker() {
        let r = BuiltinTool::Talk.execute(&args(json!({"target_id": "player_1", "utterance": "Halt!"})), &ctx());
        assert!(r.success);
        assert_eq!(r.effect["tone"], "neutral");
        assert_eq!(r.effect["speaker"], "npc_1");
    }

    #[test]
    fn move_records_origin_from_context() {
        let r = BuiltinTool::MoveTo.execute(&args(json!({"location_id": "market"})), &ctx());
        assert_eq!(r.effect["from_location"], "gate");
        assert_eq!(r.effect["to_location"], "market");

        let r = BuiltinTool::MoveTo.execute(&Map::new(), &ctx());
        assert!(!r.success);
        assert_eq!(r.error, "Missing required argument: location_id");
    }

    #[test]
    fn attack_validates_enums() {
        let r = BuiltinTool::Attack.execute(&args(json!({"target_id": "wolf", "attack_type": "melee"})), &ctx());
        assert!(r.success);
        assert_eq!(r.effect["intensity"], "medium");

        let r = BuiltinTool::Attack.execute(&args(json!({"target_id": "wolf", "attack_type": "psychic"})), &ctx());
        assert!(!r.success);
        assert!(r.error.contains("attack_type"));

        let r = BuiltinTool::Attack.execute(&args(json!({"target_id": "wolf"})), &ctx());
        assert_eq!(r.error, "Missing required arguments: target_id and attack_type");
    }

    #[test]
    fn give_item_quantity_rules() {
        let base = json!({"target_id": "p", "item_id": "i1", "item_name": "Bread"});
        let r = BuiltinTool::GiveItem.execute(&args(base.clone()), &ctx());
        assert_eq!(r.effect["quantity"], 1);

        let mut with_zero = args(base);
        with_zero.insert("quantity".into(), json!(0));
        assert!(!BuiltinTool::GiveItem.execute(&with_zero, &ctx()).success);
    }

    #[test]
    fn trade_requires_both_sides() {
        let item = json!({"item_id": "i1", "item_name": "Bread", "quantity": 2});
        let ok = BuiltinTool::Trade.execute(
            &args(json!({"target_id": "p", "offer_items": [item.clone()], "request_items": [item]})),
            &ctx(),
        );
        assert!(ok.success);

        let empty = BuiltinTool::Trade.execute(
            &args(json!({"target_id": "p", "offer_items": [], "request_items": []})),
            &ctx(),
        );
        assert_eq!(empty.error, "Missing required arguments: target_id, offer_items, request_items");
    }

    #[test]
    fn wait_and_quest_defaults() {
        let r = BuiltinTool::Wait.execute(&Map::new(), &ctx());
        assert_eq!(r.effect["reason"], "No action needed");

        let r = BuiltinTool::UpdateQuest.execute(&args(json!({"quest_id": "q1", "status": "completed"})), &ctx());
        assert_eq!(r.effect["progress_note"], "");
        assert_eq!(r.effect["updated_by"], "npc_1");

        let r = BuiltinTool::StartQuest.execute(
            &args(json!({"target_id": "p", "quest_id": "q1", "quest_name": "Rats", "quest_description": "Clear the cellar"})),
            &ctx(),
        );
        assert_eq!(r.effect["reward"], "");
        assert_eq!(r.effect["quest_giver"], "npc_1");
    }
}
