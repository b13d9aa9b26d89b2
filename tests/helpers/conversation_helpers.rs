use deskqueue::domain::entities::{Agent, Consumer, Conversation, CreateConversation};
use deskqueue::domain::ports::agent_repository::AgentRepository;
use deskqueue::domain::ports::consumer_repository::ConsumerRepository;
use deskqueue::domain::ports::conversation_repository::ConversationRepository;
use deskqueue::infrastructure::persistence::Database;

pub async fn create_test_agent(db: &Database, username: &str) -> Agent {
    let agent = Agent::new(username.to_string());
    db.create_agent(&agent)
        .await
        .expect("Failed to create test agent");
    agent
}

/// Agent with a fixed id, for tests that depend on id ordering.
pub async fn create_test_agent_with_id(db: &Database, id: &str, username: &str) -> Agent {
    let agent = Agent {
        id: id.to_string(),
        ..Agent::new(username.to_string())
    };
    db.create_agent(&agent)
        .await
        .expect("Failed to create test agent");
    agent
}

pub async fn create_test_consumer(db: &Database, email: &str) -> Consumer {
    let consumer = Consumer::new("Test".to_string(), Some("Consumer".to_string()), email.to_string());
    db.create_consumer(&consumer)
        .await
        .expect("Failed to create test consumer");
    consumer
}

pub async fn create_pending_conversation(
    db: &Database,
    consumer_id: &str,
    subject: &str,
) -> Conversation {
    let (conversation, assignment) = db
        .create_conversation(
            &CreateConversation {
                subject: subject.to_string(),
                consumer_id: consumer_id.to_string(),
                agent_id: None,
            },
            3,
        )
        .await
        .expect("Failed to create conversation");
    assert!(assignment.is_none());
    conversation
}

pub async fn get_conversation(db: &Database, id: &str) -> Conversation {
    db.get_conversation_by_id(id)
        .await
        .expect("Failed to get conversation")
        .expect("Conversation not found")
}
