// Lifecycle tests: pending -> open -> closed, rating guard
use deskqueue::domain::entities::ConversationStatus;
use deskqueue::DomainError;

mod helpers;
use helpers::*;

#[tokio::test]
async fn test_finish_then_rate() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;

    state
        .assignment_service
        .assign(&conversation.id, &agent.id)
        .await
        .unwrap();

    let finished = state
        .conversation_service
        .finish_conversation(&conversation.id, "resolved")
        .await
        .unwrap();
    assert_eq!(finished.status, ConversationStatus::Closed);
    assert!(finished.finished_at.is_some());
    assert_eq!(finished.closing_reason.as_deref(), Some("resolved"));

    let rated = state
        .conversation_service
        .rate_conversation(&conversation.id, 5)
        .await
        .unwrap();
    assert_eq!(rated.rate, Some(5));

    let stored = get_conversation(&db, &conversation.id).await;
    assert_eq!(stored.status, ConversationStatus::Closed);
    assert_eq!(stored.rate, Some(5));
    assert!(stored.check_invariants().is_ok());
}

#[tokio::test]
async fn test_rating_open_conversation_is_invalid() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;

    state
        .assignment_service
        .assign(&conversation.id, &agent.id)
        .await
        .unwrap();

    let result = state
        .conversation_service
        .rate_conversation(&conversation.id, 4)
        .await;
    assert!(matches!(result, Err(DomainError::InvalidState(_))));

    let stored = get_conversation(&db, &conversation.id).await;
    assert!(stored.rate.is_none());
}

#[tokio::test]
async fn test_rating_pending_conversation_is_invalid() {
    let (db, state) = setup_test_state(3).await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;

    let result = state
        .conversation_service
        .rate_conversation(&conversation.id, 3)
        .await;
    assert!(matches!(result, Err(DomainError::InvalidState(_))));
}

#[tokio::test]
async fn test_rating_out_of_range_is_validation_error() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;
    state
        .assignment_service
        .assign(&conversation.id, &agent.id)
        .await
        .unwrap();
    state
        .conversation_service
        .finish_conversation(&conversation.id, "done")
        .await
        .unwrap();

    for score in [0, 6, -1] {
        let result = state
            .conversation_service
            .rate_conversation(&conversation.id, score)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    assert!(get_conversation(&db, &conversation.id).await.rate.is_none());
}

#[tokio::test]
async fn test_rerating_overwrites() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;
    state
        .assignment_service
        .assign(&conversation.id, &agent.id)
        .await
        .unwrap();
    state
        .conversation_service
        .finish_conversation(&conversation.id, "done")
        .await
        .unwrap();

    state
        .conversation_service
        .rate_conversation(&conversation.id, 2)
        .await
        .unwrap();
    let rated = state
        .conversation_service
        .rate_conversation(&conversation.id, 4)
        .await
        .unwrap();

    assert_eq!(rated.rate, Some(4));
}

#[tokio::test]
async fn test_finishing_pending_is_invalid() {
    let (db, state) = setup_test_state(3).await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;

    let result = state
        .conversation_service
        .finish_conversation(&conversation.id, "too early")
        .await;
    assert!(matches!(result, Err(DomainError::InvalidState(_))));

    let stored = get_conversation(&db, &conversation.id).await;
    assert_eq!(stored.status, ConversationStatus::Pending);
    assert!(stored.finished_at.is_none());
}

#[tokio::test]
async fn test_finishing_twice_is_a_no_op() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;
    state
        .assignment_service
        .assign(&conversation.id, &agent.id)
        .await
        .unwrap();

    let first = state
        .conversation_service
        .finish_conversation(&conversation.id, "resolved")
        .await
        .unwrap();
    let second = state
        .conversation_service
        .finish_conversation(&conversation.id, "another reason")
        .await
        .unwrap();

    assert_eq!(second.finished_at, first.finished_at);
    assert_eq!(second.closing_reason.as_deref(), Some("resolved"));
}

#[tokio::test]
async fn test_closed_conversation_cannot_be_reassigned() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "help").await;
    state
        .assignment_service
        .assign(&conversation.id, &agent.id)
        .await
        .unwrap();
    state
        .conversation_service
        .finish_conversation(&conversation.id, "resolved")
        .await
        .unwrap();

    let result = state.assignment_service.assign(&conversation.id, &agent.id).await;
    assert!(matches!(result, Err(DomainError::Conflict(_))));
    assert_eq!(
        get_conversation(&db, &conversation.id).await.status,
        ConversationStatus::Closed
    );
}

#[tokio::test]
async fn test_unknown_conversation_not_found() {
    let (_db, state) = setup_test_state(3).await;

    assert!(matches!(
        state.conversation_service.finish_conversation("missing", "x").await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        state.conversation_service.rate_conversation("missing", 3).await,
        Err(DomainError::NotFound(_))
    ));
}
