//! End-to-end integration tests for Versa.
//!
//! These tests wire real configuration, persona templates, and the
//! in-memory knowledge base to a scripted generator, and drive complete
//! conversations through `ChatSession`.

use std::fs;
use std::sync::{Arc, Mutex};

use versa_agent::{ChatEngine, ChatSession, EngineSettings, MemoryPolicy};
use versa_config::AppConfig;
use versa_core::error::GeneratorError;
use versa_core::{
    ConversationLog, GenerationRequest, GenerationResponse, Generator, Persona, PersonaRegistry,
    Turn,
};
use versa_knowledge::InMemoryKnowledgeBase;

// ── Mock Generator ───────────────────────────────────────────────────────

/// Returns scripted responses in sequence and records every request.
struct ScriptedGenerator {
    responses: Vec<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn prompt(&self, i: usize) -> String {
        self.requests.lock().unwrap()[i].prompt.clone()
    }

    fn request(&self, i: usize) -> GenerationRequest {
        self.requests.lock().unwrap()[i].clone()
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GeneratorError> {
        let mut requests = self.requests.lock().unwrap();
        let text = self
            .responses
            .get(requests.len())
            .cloned()
            .unwrap_or_else(|| panic!("no scripted response for call #{}", requests.len() + 1));
        requests.push(request);

        Ok(GenerationResponse {
            text,
            model: "e2e-model".into(),
            usage: None,
        })
    }
}

const WHALES: &str = "\
Blue whales are the largest animals ever known to have lived.

Krill is the main food of the blue whale.
An adult can eat four tonnes a day.

The Rust programming language guarantees memory safety.
";

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_docbot_answers_from_knowledge_file() {
    let tmp = tempfile::tempdir().unwrap();
    let kb_path = tmp.path().join("whales.txt");
    fs::write(&kb_path, WHALES).unwrap();

    let mut config = AppConfig::default();
    config.retrieval.top_k = 1;

    let generator = ScriptedGenerator::new(&["They mostly eat krill.</s>"]);
    let kb = InMemoryKnowledgeBase::from_text_file(&kb_path).await.unwrap();
    let engine = Arc::new(
        ChatEngine::new(Arc::new(config.persona_registry().unwrap()), generator.clone())
            .with_retriever(Arc::new(kb))
            .with_settings(EngineSettings::from_config(&config)),
    );

    let mut session = ChatSession::new(engine, Persona::DocBot, MemoryPolicy::buffer(4)).unwrap();
    let reply = session.respond("What food do blue whales eat? krill?").await.unwrap();

    assert_eq!(reply.response, "They mostly eat krill.");
    let prompt = generator.prompt(0);
    assert!(prompt.contains(
        "Extracted documents:\nDocument 0:::\nKrill is the main food of the blue whale.\nAn adult can eat four tonnes a day."
    ));
    assert!(!prompt.contains("largest animals"));
    assert!(!prompt.contains("memory safety"));
    assert!(prompt.ends_with("**Question:**\nWhat food do blue whales eat? krill?"));

    // Grounded answers use the deterministic profile
    let request = generator.request(0);
    assert!((request.options.temperature - config.generation.deterministic_temperature).abs() < f32::EPSILON);
}

#[tokio::test]
async fn e2e_template_dir_and_inline_overrides() {
    let tmp = tempfile::tempdir().unwrap();
    let personas = tmp.path().join("personas");
    fs::create_dir_all(&personas).unwrap();
    fs::write(personas.join("comedian.md"), "You are a pirate comedian.").unwrap();
    fs::write(personas.join("expert.txt"), "You are a file expert.").unwrap();

    let config_path = tmp.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
persona = "comedian"

[personas]
dir = "{}"

[personas.templates]
expert = "You are an inline expert. Q: {{query}}"
"#,
            personas.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let config = AppConfig::load_from(&config_path).unwrap();
    assert_eq!(config.default_persona().unwrap(), Persona::Comedian);

    let registry = config.persona_registry().unwrap();
    assert!(registry.template(Persona::Comedian).unwrap().source.ends_with("comedian.md"));
    // Inline templates win over files
    assert_eq!(registry.template(Persona::Expert).unwrap().source, "<config>");

    let generator = ScriptedGenerator::new(&["Arr, a joke!"]);
    let engine = Arc::new(ChatEngine::new(Arc::new(registry), generator.clone()));
    let mut session = ChatSession::new(engine, Persona::Comedian, MemoryPolicy::buffer(2)).unwrap();
    session.respond("Tell me a joke").await.unwrap();

    assert_eq!(
        generator.prompt(0),
        "You are a pirate comedian.\n---\n**Question:**\nTell me a joke"
    );
}

#[tokio::test]
async fn e2e_summary_buffer_conversation() {
    let generator = ScriptedGenerator::new(&[
        "Hello there!",
        "The user greeted the assistant.",
        "Sunny, I hope.",
    ]);
    let engine = Arc::new(ChatEngine::new(
        Arc::new(PersonaRegistry::builtin()),
        generator.clone(),
    ));
    let mut session =
        ChatSession::new(engine, Persona::Default, MemoryPolicy::summary_buffer(1)).unwrap();

    // First turn: empty log, nothing to summarize
    session.respond("Hi").await.unwrap();
    assert_eq!(generator.calls(), 1);
    assert!(!generator.prompt(0).contains("**Summary"));
    assert!(!generator.prompt(0).contains("**Conversation History"));

    // Second turn: two logged turns, one kept verbatim, one summarized
    let reply = session.respond("How is the weather?").await.unwrap();
    assert_eq!(reply.response, "Sunny, I hope.");
    assert_eq!(generator.calls(), 3);

    let summary_prompt = generator.prompt(1);
    assert!(summary_prompt.contains("user: Hi\n"));
    assert!(!summary_prompt.contains("Hello there!"));

    let chat_prompt = generator.prompt(2);
    assert!(chat_prompt.contains("**Summary of the conversation so far:**\nThe user greeted the assistant."));
    assert!(chat_prompt.contains("**Conversation History:**\nassistant: Hello there!\n"));
    assert!(chat_prompt.ends_with("**Question:**\nHow is the weather?"));

    assert_eq!(session.log().len(), 4);
}

#[tokio::test]
async fn e2e_persona_switch_starts_fresh() {
    let generator = ScriptedGenerator::new(&["Hello", "Knock knock."]);
    let engine = Arc::new(ChatEngine::new(
        Arc::new(PersonaRegistry::builtin()),
        generator.clone(),
    ));
    let mut session = ChatSession::new(engine, Persona::Therapist, MemoryPolicy::buffer(4)).unwrap();

    session.respond("Hi").await.unwrap();
    assert_eq!(session.log().len(), 2);

    session.switch_persona(Persona::Comedian).unwrap();
    assert!(session.log().is_empty());

    session.respond("Make me laugh").await.unwrap();
    assert!(!generator.prompt(1).contains("user: Hi"));
    assert_eq!(
        session.log().turns(),
        &[Turn::user("Make me laugh"), Turn::assistant("Knock knock.")]
    );
}

#[tokio::test]
async fn e2e_resumed_log_respects_buffer_len() {
    let generator = ScriptedGenerator::new(&[]);
    let engine = ChatEngine::new(Arc::new(PersonaRegistry::builtin()), generator.clone());
    let log = ConversationLog::from_turns(vec![
        Turn::user("Hi"),
        Turn::assistant("Hello"),
        Turn::user("How are you?"),
    ]);

    let one = engine
        .assemble_prompt(Persona::Default, "How are you?", &log, MemoryPolicy::buffer(1))
        .await
        .unwrap();
    let zero = engine
        .assemble_prompt(Persona::Default, "How are you?", &log, MemoryPolicy::buffer(0))
        .await
        .unwrap();
    let many = engine
        .assemble_prompt(Persona::Default, "How are you?", &log, MemoryPolicy::buffer(50))
        .await
        .unwrap();

    assert!(one.contains("**Conversation History:**\nassistant: Hello\n"));
    assert!(!one.contains("user: Hi"));
    assert!(!zero.contains("**Conversation History"));
    assert!(many.contains("**Conversation History:**\nuser: Hi\nassistant: Hello\n"));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn e2e_configuration_errors_fail_fast() {
    let generator = ScriptedGenerator::new(&[]);
    let engine = Arc::new(ChatEngine::new(
        Arc::new(PersonaRegistry::builtin()),
        generator.clone(),
    ));

    assert!(ChatSession::new(engine.clone(), Persona::DocBot, MemoryPolicy::buffer(2)).is_err());
    assert!(MemoryPolicy::new(Default::default(), -1).is_err());
    assert!("Pirate".parse::<Persona>().is_err());

    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("config.toml");
    fs::write(&config_path, "[memory]\nbuffer_len = -3\n").unwrap();
    assert!(AppConfig::load_from(&config_path).is_err());

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn e2e_resumed_session_continues_conversation() {
    let generator = ScriptedGenerator::new(&["Still doing well."]);
    let engine = Arc::new(ChatEngine::new(
        Arc::new(PersonaRegistry::builtin()),
        generator.clone(),
    ));
    let earlier = ConversationLog::from_turns(vec![Turn::user("Hi"), Turn::assistant("Hello")]);
    let mut session = ChatSession::new(engine, Persona::Default, MemoryPolicy::buffer(4))
        .unwrap()
        .with_log(earlier);

    session.respond("Still there?").await.unwrap();

    assert!(generator
        .prompt(0)
        .contains("**Conversation History:**\nuser: Hi\nassistant: Hello\n"));
    assert_eq!(session.log().len(), 4);
}
