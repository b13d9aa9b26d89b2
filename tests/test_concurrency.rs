// Concurrent assignment: at most one winner, cap never exceeded
use deskqueue::domain::entities::ConversationStatus;
use deskqueue::domain::ports::agent_repository::AgentRepository;
use deskqueue::DomainError;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

mod helpers;
use helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assigns_of_one_conversation_single_winner() {
    let (db, state) = setup_test_state(3).await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    let conversation = create_pending_conversation(&db, &consumer.id, "contested").await;

    let mut agents = Vec::new();
    for i in 0..8 {
        agents.push(create_test_agent(&db, &format!("agent{}", i)).await);
    }

    let attempts = agents.iter().map(|agent| {
        let service = state.assignment_service.clone();
        let conversation_id = conversation.id.clone();
        let agent_id = agent.id.clone();
        tokio::spawn(async move { service.assign(&conversation_id, &agent_id).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    let stored = get_conversation(&db, &conversation.id).await;
    assert_eq!(stored.status, ConversationStatus::Open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assigns_to_one_agent_respect_cap() {
    let (db, state) = setup_test_state(3).await;
    let agent = create_test_agent(&db, "alice").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;

    let mut conversations = Vec::new();
    for i in 0..10 {
        conversations.push(create_pending_conversation(&db, &consumer.id, &format!("c{}", i)).await);
    }

    let attempts = conversations.iter().map(|conversation| {
        let service = state.assignment_service.clone();
        let conversation_id = conversation.id.clone();
        let agent_id = agent.id.clone();
        tokio::spawn(async move { service.assign(&conversation_id, &agent_id).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let assigned = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(DomainError::CapacityExceeded(_))))
        .count();

    assert_eq!(assigned, 3);
    assert_eq!(rejected, 7);
    assert_eq!(db.count_open_conversations(&agent.id).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pass_racing_manual_assigns_never_exceeds_cap() {
    let (db, state) = setup_test_state(2).await;
    let alice = create_test_agent(&db, "alice").await;
    let bob = create_test_agent(&db, "bob").await;
    let consumer = create_test_consumer(&db, "c1@example.com").await;

    let mut conversations = Vec::new();
    for i in 0..8 {
        conversations.push(create_pending_conversation(&db, &consumer.id, &format!("c{}", i)).await);
    }

    let pass_service = state.assignment_service.clone();
    let pass = tokio::spawn(async move {
        pass_service
            .run_distribution_pass(&CancellationToken::new())
            .await
    });

    let manual = conversations.iter().rev().take(4).map(|conversation| {
        let service = state.assignment_service.clone();
        let conversation_id = conversation.id.clone();
        let agent_id = alice.id.clone();
        tokio::spawn(async move { service.assign(&conversation_id, &agent_id).await })
    });

    let (pass_result, manual_results) = tokio::join!(pass, join_all(manual));
    pass_result.expect("pass panicked").expect("pass failed");
    for joined in manual_results {
        let result = joined.expect("task panicked");
        assert!(matches!(
            result,
            Ok(_) | Err(DomainError::CapacityExceeded(_)) | Err(DomainError::Conflict(_))
        ));
    }

    assert!(db.count_open_conversations(&alice.id).await.unwrap() <= 2);
    assert!(db.count_open_conversations(&bob.id).await.unwrap() <= 2);

    let depth = state.conversation_service.queue_depth().await.unwrap();
    let open = db.count_open_conversations(&alice.id).await.unwrap()
        + db.count_open_conversations(&bob.id).await.unwrap();
    assert_eq!(depth.pending_count + open, 8);
}

#[tokio::test]
async fn test_overlapping_passes_run_once() {
    let (db, state) = setup_test_state(15).await;
    for i in 0..4 {
        create_test_agent(&db, &format!("agent{}", i)).await;
    }
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    for i in 0..60 {
        create_pending_conversation(&db, &consumer.id, &format!("c{}", i)).await;
    }

    // The first pass takes the guard before its first await, so the second
    // is polled while the first is still running.
    let cancel = CancellationToken::new();
    let (first, second) = tokio::join!(
        state.assignment_service.run_distribution_pass(&cancel),
        state.assignment_service.run_distribution_pass(&cancel),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert!(!first.already_running);
    assert_eq!(first.assigned.len(), 60);
    assert_eq!(first.remaining, 0);

    assert!(second.already_running);
    assert!(second.assigned.is_empty());
    assert_eq!(second.skipped, 0);

    // The guard is released once the pass finishes
    let third = state
        .assignment_service
        .run_distribution_pass(&cancel)
        .await
        .unwrap();
    assert!(!third.already_running);
    assert!(third.assigned.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_passes_from_clones_never_split_the_queue() {
    let (db, state) = setup_test_state(15).await;
    for i in 0..4 {
        create_test_agent(&db, &format!("agent{}", i)).await;
    }
    let consumer = create_test_consumer(&db, "c1@example.com").await;
    for i in 0..60 {
        create_pending_conversation(&db, &consumer.id, &format!("c{}", i)).await;
    }

    let passes = (0..2).map(|_| {
        let service = state.assignment_service.clone();
        tokio::spawn(async move { service.run_distribution_pass(&CancellationToken::new()).await })
    });
    let reports: Vec<_> = join_all(passes)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("pass failed"))
        .collect();

    // One pass does all the work; the other was either turned away or found
    // an empty queue.
    let working: Vec<_> = reports.iter().filter(|r| !r.assigned.is_empty()).collect();
    assert_eq!(working.len(), 1);
    assert_eq!(working[0].assigned.len(), 60);
    assert!(reports.iter().all(|r| r.skipped == 0));

    let depth = state.conversation_service.queue_depth().await.unwrap();
    assert_eq!(depth.pending_count, 0);
}
