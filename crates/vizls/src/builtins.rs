//
// builtins.rs
//
// Versioned builtin catalogs: root classes, global procedures, keywords and
// events for the three supported engine generations. Catalog data is embedded
// JSON, loaded once per process; a malformed entry is skipped with a warning
// and never aborts the load.
//

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::symbols::{Overload, Symbol, SymbolKind};

/// One of the three supported engine generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialectVersion {
    #[default]
    Viz3,
    Viz4,
    Viz5,
}

/// Whether the document is a scene script or a container script. Decides the
/// type behind the synthesized `This` alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptKind {
    #[default]
    Scene,
    Container,
}

/// Dialect version and script kind, derived from the LSP language id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LanguageVariant {
    pub version: DialectVersion,
    pub kind: ScriptKind,
}

impl LanguageVariant {
    /// `viz`/`viz4`/`viz5` select the version, a `-con` suffix selects the
    /// container flavor. Unknown ids fall back to the oldest scene dialect.
    pub fn from_language_id(id: &str) -> Self {
        let (base, kind) = match id.strip_suffix("-con") {
            Some(base) => (base, ScriptKind::Container),
            None => (id, ScriptKind::Scene),
        };
        let version = match base {
            "viz4" => DialectVersion::Viz4,
            "viz5" => DialectVersion::Viz5,
            "viz" => DialectVersion::Viz3,
            other => {
                log::trace!("Unknown language id '{}', assuming viz", other);
                DialectVersion::Viz3
            }
        };
        Self { version, kind }
    }
}

// ============================================================================
// Static word tables
// ============================================================================

/// Language keywords offered in root-level completion. Stored capitalized;
/// the `keywordLowercase` setting decides the displayed case.
pub const KEYWORDS: &[&str] = &[
    "Dim", "As", "Sub", "Function", "Structure", "End", "If", "Then", "Else", "ElseIf", "For",
    "To", "Step", "Next", "While", "Do", "Loop", "Until", "Exit", "Return", "True", "False",
    "And", "Or", "Xor", "Not", "Mod", "Global", "Local", "ReDim", "Null",
];

/// Builtin script events: name, header hint, description.
const EVENTS: &[(&str, &str, &str)] = &[
    ("OnInit", "OnInit()", "Called once after the script is compiled."),
    ("OnInitParameters", "OnInitParameters()", "Called once to register script parameters."),
    ("OnParameterChanged", "OnParameterChanged(ParameterName As String)", "Called when a script parameter changes."),
    ("OnEnter", "OnEnter()", "Called when the cursor enters the container (container scripts)."),
    ("OnLeave", "OnLeave()", "Called when the cursor leaves the container (container scripts)."),
    ("OnEnterSubContainer", "OnEnterSubContainer(SubContainer As Container)", "Called when the cursor enters a sub container."),
    ("OnLeaveSubContainer", "OnLeaveSubContainer(SubContainer As Container)", "Called when the cursor leaves a sub container."),
    ("OnExecPerField", "OnExecPerField()", "Called once per rendered field."),
    ("OnExecAction", "OnExecAction(ButtonId As Integer)", "Called when an action button fires."),
    ("OnGuiStatus", "OnGuiStatus()", "Called when the GUI requests a status refresh."),
    ("OnKeyDown", "OnKeyDown(KeyCode As Integer)", "Called on a key press."),
    ("OnKeyUp", "OnKeyUp(KeyCode As Integer)", "Called on a key release."),
    ("OnButtonDown6DOF", "OnButtonDown6DOF(Button As Integer, Pos As Position, Rot As Rotation)", "Called on a 6DOF device button press."),
    ("OnButtonUp6DOF", "OnButtonUp6DOF(Button As Integer, Pos As Position, Rot As Rotation)", "Called on a 6DOF device button release."),
    ("OnMove6DOF", "OnMove6DOF(Button As Integer, Pos As Position, Rot As Rotation)", "Called when a 6DOF device moves."),
    ("OnScale6DOF", "OnScale6DOF(Button As Integer, Scale As Scaling)", "Called when a 6DOF device scales."),
    ("OnMTHit", "OnMTHit(Stroke As Integer, X As Integer, Y As Integer)", "Called on a multi-touch hit test."),
    ("OnMTMenu", "OnMTMenu(X As Integer, Y As Integer)", "Called on a multi-touch menu gesture."),
    ("OnSharedMemoryVariableChanged", "OnSharedMemoryVariableChanged(Map As SharedMemory, MapKey As String)", "Called when a watched shared memory key changes."),
    ("OnSharedMemoryVariableDeleted", "OnSharedMemoryVariableDeleted(Map As SharedMemory, MapKey As String)", "Called when a watched shared memory key is deleted."),
    ("OnGeometryChanged", "OnGeometryChanged(Geom As Geometry)", "Called when the container geometry is replaced."),
];

// ============================================================================
// Catalog data model
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    methods: Vec<serde_json::Value>,
    #[serde(default)]
    properties: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    name: String,
    code_hint: String,
    #[serde(default)]
    return_value: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    deprecated: bool,
}

/// The distinguished entry whose methods become the global procedure table.
const GLOBAL_PROCEDURES_ENTRY: &str = "Global Procedures";

/// Immutable per-version builtin tables. Built once, never mutated by
/// resolution.
pub struct BuiltinCatalog {
    pub version: DialectVersion,
    /// Root classes keyed by lowercased name, in catalog order.
    pub classes: IndexMap<String, Symbol>,
    pub global_procedures: Vec<Symbol>,
    pub keywords: Vec<Symbol>,
    pub events: Vec<Symbol>,
    this_scene: Symbol,
    this_container: Symbol,
}

impl BuiltinCatalog {
    pub fn find_class(&self, name: &str) -> Option<&Symbol> {
        self.classes.get(&name.to_ascii_lowercase())
    }

    pub fn find_global_procedure(&self, name: &str) -> Option<&Symbol> {
        self.global_procedures.iter().find(|s| s.name_matches(name))
    }

    pub fn find_keyword(&self, name: &str) -> Option<&Symbol> {
        self.keywords.iter().find(|s| s.name_matches(name))
    }

    pub fn find_event(&self, name: &str) -> Option<&Symbol> {
        self.events.iter().find(|s| s.name_matches(name))
    }

    /// The synthesized implicit script object for the given script kind.
    pub fn this_alias(&self, kind: ScriptKind) -> &Symbol {
        match kind {
            ScriptKind::Scene => &self.this_scene,
            ScriptKind::Container => &self.this_container,
        }
    }

    /// First-hop lookup across every root space: classes, global procedures,
    /// keywords, events, and (when allowed) the `This` alias.
    pub fn find_root(&self, name: &str, kind: ScriptKind, allow_this: bool) -> Option<&Symbol> {
        if allow_this && name.eq_ignore_ascii_case("this") {
            return Some(self.this_alias(kind));
        }
        self.find_class(name)
            .or_else(|| self.find_global_procedure(name))
            .or_else(|| self.find_event(name))
            .or_else(|| self.find_keyword(name))
    }
}

fn member_symbol(raw: RawMember, kind: SymbolKind, parent: &str) -> Symbol {
    let mut sym = Symbol::new(raw.name, kind);
    sym.declared_type = raw.return_value;
    sym.hint = raw.code_hint;
    sym.documentation = raw.description;
    sym.deprecated = raw.deprecated;
    sym.parent_scope = parent.to_string();
    sym
}

/// Fold a member into the list, merging a repeated name into the earlier
/// symbol's overload list instead of inserting a duplicate.
fn push_merging(list: &mut Vec<Symbol>, sym: Symbol) {
    if let Some(existing) = list
        .iter_mut()
        .find(|s| s.name_matches(&sym.name) && s.kind == sym.kind)
    {
        existing.overloads.push(Overload {
            hint: sym.hint,
            documentation: sym.documentation,
        });
        return;
    }
    list.push(sym);
}

fn parse_members(values: Vec<serde_json::Value>, kind: SymbolKind, parent: &str) -> Vec<Symbol> {
    let mut members = Vec::new();
    for value in values {
        match serde_json::from_value::<RawMember>(value) {
            Ok(raw) => push_merging(&mut members, member_symbol(raw, kind, parent)),
            Err(err) => {
                log::warn!("Skipping malformed member of '{}': {}", parent, err);
            }
        }
    }
    members
}

fn make_this(type_name: &str) -> Symbol {
    let mut sym = Symbol::new("This", SymbolKind::Variable).with_type(type_name);
    sym.hint = format!("This As {}", type_name);
    sym.documentation = format!("The script's implicit {} object.", type_name);
    sym
}

fn load_catalog(data: &str, version: DialectVersion) -> BuiltinCatalog {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(err) => {
            log::warn!("Builtin catalog for {:?} failed to parse: {}", version, err);
            Vec::new()
        }
    };

    let mut classes = IndexMap::new();
    let mut global_procedures = Vec::new();

    for value in entries {
        let raw = match serde_json::from_value::<RawEntry>(value) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("Skipping malformed catalog entry: {}", err);
                continue;
            }
        };

        if raw.name == GLOBAL_PROCEDURES_ENTRY {
            for value in raw.methods {
                match serde_json::from_value::<RawMember>(value) {
                    Ok(m) => push_merging(
                        &mut global_procedures,
                        member_symbol(m, SymbolKind::Function, ""),
                    ),
                    Err(err) => log::warn!("Skipping malformed global procedure: {}", err),
                }
            }
            continue;
        }

        let mut class = Symbol::new(raw.name.clone(), SymbolKind::Class);
        class.hint = raw.name.clone();
        class.documentation = raw.description;
        class.children = parse_members(raw.methods, SymbolKind::Method, &raw.name);
        class
            .children
            .extend(parse_members(raw.properties, SymbolKind::Field, &raw.name));
        classes.insert(raw.name.to_ascii_lowercase(), class);
    }

    let keywords = KEYWORDS
        .iter()
        .map(|k| Symbol::new(*k, SymbolKind::Keyword))
        .collect();

    let events = EVENTS
        .iter()
        .map(|(name, hint, description)| {
            let mut sym = Symbol::new(*name, SymbolKind::Event);
            sym.hint = (*hint).to_string();
            sym.documentation = (*description).to_string();
            sym
        })
        .collect();

    log::info!(
        "Loaded builtin catalog {:?}: {} classes, {} global procedures",
        version,
        classes.len(),
        global_procedures.len()
    );

    BuiltinCatalog {
        version,
        classes,
        global_procedures,
        keywords,
        events,
        this_scene: make_this("Scene"),
        this_container: make_this("Container"),
    }
}

static VIZ3: Lazy<BuiltinCatalog> = Lazy::new(|| {
    load_catalog(
        include_str!("../data/viz3_builtins.json"),
        DialectVersion::Viz3,
    )
});
static VIZ4: Lazy<BuiltinCatalog> = Lazy::new(|| {
    load_catalog(
        include_str!("../data/viz4_builtins.json"),
        DialectVersion::Viz4,
    )
});
static VIZ5: Lazy<BuiltinCatalog> = Lazy::new(|| {
    load_catalog(
        include_str!("../data/viz5_builtins.json"),
        DialectVersion::Viz5,
    )
});

/// The process-wide catalog for a dialect version.
pub fn catalog(version: DialectVersion) -> &'static BuiltinCatalog {
    match version {
        DialectVersion::Viz3 => &VIZ3,
        DialectVersion::Viz4 => &VIZ4,
        DialectVersion::Viz5 => &VIZ5,
    }
}
