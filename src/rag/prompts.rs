//! Report section prompt registry
//!
//! Each report section carries a system context, a task, an optional
//! retrieval query, and optional format and example blocks. Sections
//! without a query are answered with an empty context and never hit the
//! vector index.

use crate::llm::ChatMessage;

/// Core report sections, processed in this order.
pub const CORE_SECTIONS: &[&str] = &[
    "introduction",
    "functional_flows",
    "third_party_integrations",
];

pub const MICROSERVICE_SUMMARY: &str = "microservice_summary";

/// Sections whose bodies are folded into the assessment additional info.
pub const REUSED_SECTIONS: &[&str] = &["functional_flows", "third_party_integrations"];

/// Placeholder interpolated into the microservice prompt and query.
const SERVICE_PLACEHOLDER: &str = "{service}";

/// Static template for one report section.
#[derive(Debug, Clone, Copy)]
pub struct SectionPrompt {
    pub key: &'static str,
    pub system_context: &'static str,
    pub task: &'static str,
    pub query: Option<&'static str>,
    pub format: Option<&'static str>,
    pub example: Option<&'static str>,
    pub instructions: Option<&'static str>,
}

const INTRODUCTION: SectionPrompt = SectionPrompt {
    key: "introduction",
    system_context: "You are a principal security architect writing the introduction of an \
architecture review report. Describe the system's purpose, its main components and the \
overall deployment model in clear prose.",
    task: "Write an introduction describing what this system does, who uses it and how its \
major components fit together.",
    query: Some(
        "system overview purpose architecture components deployment users",
    ),
    format: Some("Two to four paragraphs of prose. No bullet lists."),
    example: None,
    instructions: Some("Do not speculate beyond what the context supports."),
};

const FUNCTIONAL_FLOWS: SectionPrompt = SectionPrompt {
    key: "functional_flows",
    system_context: "You are a principal security architect documenting the functional flows \
of a system. Identify every end-to-end flow: the actor that triggers it, the components it \
crosses and the data it carries.",
    task: "Enumerate the functional flows of this system. For each flow name the trigger, \
the sequence of components involved and the data exchanged.",
    query: Some(
        "functional flow user action request sequence data exchanged between components",
    ),
    format: Some(
        "A numbered list of flows. Each entry: flow name, trigger, component sequence, data.",
    ),
    example: Some(
        "1. Checkout: customer submits cart; web frontend -> order service -> payment \
gateway; cart contents and card token.",
    ),
    instructions: Some("Merge duplicate flows; one entry per distinct end-to-end path."),
};

const THIRD_PARTY_INTEGRATIONS: SectionPrompt = SectionPrompt {
    key: "third_party_integrations",
    system_context: "You are a principal security architect cataloguing the external \
dependencies of a system. Identify every third party service, API or hosted component the \
system talks to and what is exchanged with it.",
    task: "List every third party integration of this system with the protocol used, the \
direction of the connection and the data shared.",
    query: Some(
        "third party external service integration API vendor SaaS dependency",
    ),
    format: Some(
        "A numbered list. Each entry: integration name, protocol, direction, data shared.",
    ),
    example: None,
    instructions: Some("Include hosted infrastructure the system depends on, not just APIs."),
};

const MICROSERVICE: SectionPrompt = SectionPrompt {
    key: MICROSERVICE_SUMMARY,
    system_context: "You are a principal security architect summarising one microservice of \
a larger system. Cover its responsibility, its interfaces, the data it owns and the other \
services it depends on.",
    task: "Summarise the {service} microservice: its responsibility, exposed interfaces, \
owned data and upstream or downstream dependencies.",
    query: Some("{service} microservice responsibility API endpoints data dependencies"),
    format: Some("Two or three short paragraphs."),
    example: None,
    instructions: None,
};

/// Look up a section prompt by key.
pub fn section_prompt(key: &str) -> Option<&'static SectionPrompt> {
    match key {
        "introduction" => Some(&INTRODUCTION),
        "functional_flows" => Some(&FUNCTIONAL_FLOWS),
        "third_party_integrations" => Some(&THIRD_PARTY_INTEGRATIONS),
        MICROSERVICE_SUMMARY => Some(&MICROSERVICE),
        _ => None,
    }
}

impl SectionPrompt {
    /// Retrieval query with the service name interpolated where present.
    pub fn query_for(&self, service: Option<&str>) -> Option<String> {
        self.query.map(|q| interpolate(q, service))
    }

    /// Build the chat messages for this section given retrieved context.
    ///
    /// The system message pins the model to the provided context; sections
    /// without retrieval pass an empty context string.
    pub fn build_messages(&self, context: &str, service: Option<&str>) -> Vec<ChatMessage> {
        let mut system = format!(
            "{}\nONLY use provided context = {} to answer.",
            self.system_context, context
        );
        if let Some(format_block) = self.format {
            system.push_str("\n\nRequired format: ");
            system.push_str(format_block);
        }
        if let Some(example) = self.example {
            system.push_str("\n\nExample: ");
            system.push_str(example);
        }
        if let Some(instructions) = self.instructions {
            system.push_str("\n\n");
            system.push_str(instructions);
        }

        let task = interpolate(self.task, service);
        let user = format!("{task}\n<question>{task}</question>");

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

fn interpolate(template: &str, service: Option<&str>) -> String {
    match service {
        Some(name) => template.replace(SERVICE_PLACEHOLDER, name),
        None => template.to_string(),
    }
}
