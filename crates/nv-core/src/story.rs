use serde::{Deserialize, Serialize};

/// A named, ordered sequence of steps. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryUnit {
    /// Unit id; files without one take the requested name.
    #[serde(default)]
    pub id: String,
    /// Steps, addressed by position.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl StoryUnit {
    /// Create a unit from steps.
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            steps,
        }
    }

    /// Position of the step carrying `label` as its id.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.id.as_deref() == Some(label))
    }

    /// Step at `index`.
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the unit has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every jump target named by `goto` steps and choice actions, with the
    /// index of the step that names it.
    pub fn goto_targets(&self) -> Vec<(usize, &str)> {
        let mut targets = Vec::new();
        for (i, step) in self.steps.iter().enumerate() {
            match &step.kind {
                StepKind::Goto { target } => targets.push((i, target.as_str())),
                StepKind::Choice(choice) => {
                    for action in choice.options.iter().flat_map(ChoiceOption::actions) {
                        if let ChoiceAction::Goto { target } = action {
                            targets.push((i, target.as_str()));
                        }
                    }
                }
                _ => {}
            }
        }
        targets
    }
}

/// One step: an optional label plus its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Map<String, serde_json::Value>")]
pub struct Step {
    /// Label used by `goto`. Scene steps also read it as the scene id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// What the step does.
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    /// An unlabelled step.
    pub fn new(kind: StepKind) -> Self {
        Self { id: None, kind }
    }

    /// Attach a label.
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.id = Some(label.into());
        self
    }

    /// An assignment step.
    pub fn assign(expr: impl Into<String>) -> Self {
        Self::new(StepKind::Assign {
            variable: expr.into(),
        })
    }

    /// A dialogue (with speaker) or narration (without) step.
    pub fn dialogue(character: Option<&str>, text: impl Into<String>) -> Self {
        Self::new(StepKind::Dialogue(Dialogue {
            character: character.map(str::to_string),
            text: text.into(),
            ..Dialogue::default()
        }))
    }

    /// A `goto` step.
    pub fn goto(target: impl Into<String>) -> Self {
        Self::new(StepKind::Goto {
            target: target.into(),
        })
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for Step {
    type Error = String;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let id = match map.get("id") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        let typed = map.contains_key("type");
        let kind: StepKind = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| e.to_string())?;
        if typed && matches!(kind, StepKind::Assign { .. }) {
            return Err("unknown step type".to_string());
        }
        Ok(Self { id, kind })
    }
}

/// The closed set of step kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepKind {
    /// Change the backdrop.
    Scene {
        /// Scene id; when absent the step label is used.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scene: Option<String>,
    },
    /// Add a character to the visible set.
    Show {
        /// Character id.
        character: String,
    },
    /// Remove a character from the visible set.
    Hide {
        /// Character id.
        character: String,
    },
    /// Play a sound effect.
    Sound(AudioCue),
    /// Play a voice line.
    Voice(AudioCue),
    /// Play music.
    Music(AudioCue),
    /// Stop one stream.
    StopStream {
        /// Stream id.
        stream: String,
    },
    /// Stop every stream.
    StopAllStreams,
    /// A spoken or narrated line, possibly delivered in parts.
    Dialogue(Dialogue),
    /// A title card.
    Titles(Titles),
    /// Ask the player for text.
    Inputtext {
        /// Path the answer is written to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable: Option<String>,
        /// Prompt.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Offer options.
    Choice(ChoiceStep),
    /// Jump to a local label or call another unit.
    Goto {
        /// Label or unit id.
        target: String,
    },
    /// Return to the caller.
    Continue,
    /// Return to the caller, or finish the session at top level.
    End,
    /// Assignment-only step, written without a `type`.
    #[serde(untagged)]
    Assign {
        /// Expression `<path> <op> <rhs>`.
        variable: String,
    },
}

impl StepKind {
    /// Wire name of the kind. Assignments have none.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scene { .. } => "scene",
            Self::Show { .. } => "show",
            Self::Hide { .. } => "hide",
            Self::Sound(_) => "sound",
            Self::Voice(_) => "voice",
            Self::Music(_) => "music",
            Self::StopStream { .. } => "stop-stream",
            Self::StopAllStreams => "stop-all-streams",
            Self::Dialogue(_) => "dialogue",
            Self::Titles(_) => "titles",
            Self::Inputtext { .. } => "inputtext",
            Self::Choice(_) => "choice",
            Self::Goto { .. } => "goto",
            Self::Continue => "continue",
            Self::End => "end",
            Self::Assign { .. } => "variable",
        }
    }
}

/// Fields shared by `sound`, `voice` and `music`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioCue {
    /// Asset reference.
    pub file: String,
    /// Loop flag; defaults per stream kind.
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looping: Option<bool>,
    /// Stream id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
}

/// A `dialogue` step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dialogue {
    /// Speaker id; narration when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    /// Line text with `{path}` placeholders.
    #[serde(default)]
    pub text: String,
    /// Assignment applied before the line is shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    /// Parts delivered one `advance()` at a time after `text`.
    #[serde(default, rename = "steps", skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<DialoguePart>,
}

/// One part of a multi-part dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DialoguePart {
    /// Text appended to what is already displayed.
    #[serde(default)]
    pub text: String,
    /// Assignment applied before the part is shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

/// A `titles` step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Titles {
    /// Title text.
    #[serde(default)]
    pub text: String,
    /// Auto-resume delay in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Effect played on entry.
    #[serde(default, rename = "effect-start", skip_serializing_if = "Option::is_none")]
    pub effect_start: Option<String>,
    /// Effect held while shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// Effect played on exit. When present, the renderer acknowledges it
    /// before the story resumes.
    #[serde(default, rename = "effect-end", skip_serializing_if = "Option::is_none")]
    pub effect_end: Option<String>,
    /// Reveal text character by character.
    #[serde(default)]
    pub typewriter: bool,
    /// Assignment applied before the title is shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

impl Titles {
    /// Positive whole-millisecond duration, if any.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
    }
}

/// A `choice` step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChoiceStep {
    /// Prompt shown above the options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Speaker id of the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Options in display order.
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

/// One option of a choice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Label with `{path}` placeholders.
    #[serde(default)]
    pub text: String,
    /// Actions run when picked; plain advance when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ChoiceAction>>,
}

impl ChoiceOption {
    /// The option's actions, empty when it has none.
    pub fn actions(&self) -> &[ChoiceAction] {
        self.actions.as_deref().unwrap_or_default()
    }
}

/// An action attached to a choice option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChoiceAction {
    /// Show a line, then wait for `advance()`.
    Dialogue {
        /// Speaker id; narration when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character: Option<String>,
        /// Line text.
        #[serde(default)]
        text: String,
    },
    /// Jump, ending the action list.
    Goto {
        /// Label or unit id.
        target: String,
    },
    /// Show a character.
    Show {
        /// Character id.
        character: String,
    },
    /// Hide a character.
    Hide {
        /// Character id.
        character: String,
    },
}

/// A saved return position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Unit to return to.
    pub story_id: String,
    /// Step to resume at.
    pub step_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Step, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn parses_assignment_without_type() {
        let step = parse(r#"{"variable":"global.score=0"}"#).unwrap();
        assert_eq!(
            step.kind,
            StepKind::Assign {
                variable: "global.score=0".into()
            }
        );
    }

    #[test]
    fn parses_labelled_typed_steps() {
        let step = parse(r#"{"id":"intro","type":"dialogue","character":"mc","text":"Hi"}"#).unwrap();
        assert_eq!(step.id.as_deref(), Some("intro"));
        let StepKind::Dialogue(d) = step.kind else {
            panic!("expected dialogue");
        };
        assert_eq!(d.character.as_deref(), Some("mc"));

        let step = parse(r#"{"type":"stop-all-streams"}"#).unwrap();
        assert_eq!(step.kind, StepKind::StopAllStreams);

        let step = parse(r#"{"type":"music","file":"a.ogg","loop":true,"stream":"bgm"}"#).unwrap();
        assert_eq!(
            step.kind,
            StepKind::Music(AudioCue {
                file: "a.ogg".into(),
                looping: Some(true),
                stream: Some("bgm".into()),
            })
        );
    }

    #[test]
    fn parses_titles_with_hyphenated_effects() {
        let step = parse(
            r#"{"type":"titles","text":"Ch. 1","duration":1500,"effect-start":"fade-in","effect-end":"fade-out"}"#,
        )
        .unwrap();
        let StepKind::Titles(t) = step.kind else {
            panic!("expected titles");
        };
        assert_eq!(t.duration_ms(), Some(1500));
        assert_eq!(t.effect_end.as_deref(), Some("fade-out"));
        assert!(!t.typewriter);
    }

    #[test]
    fn rejects_unknown_kinds() {
        assert!(parse(r#"{"type":"teleport","target":"x"}"#).is_err());
        assert!(parse(r#"{"type":"teleport","variable":"global.x=1"}"#).is_err());
        assert!(parse(r#"{"text":"no kind"}"#).is_err());
        assert!(
            parse(r#"{"type":"choice","options":[{"text":"a","actions":[{"type":"explode"}]}]}"#)
                .is_err()
        );
    }

    #[test]
    fn label_lookup_and_goto_targets() {
        let unit: StoryUnit = serde_json::from_str(
            r#"{"id":"start","steps":[
                {"type":"choice","options":[{"text":"a"},{"text":"b","actions":[{"type":"goto","target":"ending_b"}]}]},
                {"type":"goto","target":"chapter2"},
                {"id":"ending_b","type":"end"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(unit.label_index("ending_b"), Some(2));
        assert_eq!(unit.label_index("nope"), None);
        assert_eq!(unit.goto_targets(), vec![(0, "ending_b"), (1, "chapter2")]);
    }

    #[test]
    fn steps_serialize_flat() {
        let json = serde_json::to_string(&Step::goto("x").labelled("here")).unwrap();
        assert_eq!(json, r#"{"id":"here","type":"goto","target":"x"}"#);
        let json = serde_json::to_string(&Step::assign("global.a=1")).unwrap();
        assert_eq!(json, r#"{"variable":"global.a=1"}"#);
    }

    #[test]
    fn call_frames_use_camel_case() {
        let frame = CallFrame {
            story_id: "start".into(),
            step_index: 3,
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"storyId":"start","stepIndex":3}"#
        );
    }
}
