//! 房间准入控制单元测试。

use std::sync::Arc;
use std::time::Duration;

use domain::{DomainError, Participant, ParticipantRole, UserId};
use uuid::Uuid;

use crate::clock::fixed::FixedClock;
use crate::error::ApplicationError;
use crate::repository::memory::{MemoryParticipantRepository, MemoryRoomRepository};
use crate::services::{CreateRoomRequest, RoomService, RoomServiceDependencies};
use crate::unread::UnreadCounts;

struct Harness {
    unread: Arc<UnreadCounts>,
    service: RoomService,
    employer: Participant,
    freelancer: Participant,
}

fn participant(role: ParticipantRole, username: &str) -> Participant {
    Participant {
        id: UserId::from(Uuid::new_v4()),
        username: username.to_owned(),
        avatar_url: None,
        role,
    }
}

async fn harness() -> Harness {
    let participants = Arc::new(MemoryParticipantRepository::new());
    let unread = Arc::new(UnreadCounts::new());

    let employer = participant(ParticipantRole::Employer, "acme");
    let freelancer = participant(ParticipantRole::Freelancer, "dev");
    participants.add(employer.clone()).await;
    participants.add(freelancer.clone()).await;

    let service = RoomService::new(RoomServiceDependencies {
        rooms: Arc::new(MemoryRoomRepository::new()),
        participants,
        unread: unread.clone(),
        clock: Arc::new(FixedClock::starting_at(chrono::Utc::now())),
        operation_timeout: Duration::from_secs(1),
    });

    Harness {
        unread,
        service,
        employer,
        freelancer,
    }
}

fn create_request(harness: &Harness) -> CreateRoomRequest {
    CreateRoomRequest {
        employer_id: Uuid::from(harness.employer.id),
        freelancer_id: Uuid::from(harness.freelancer.id),
        name: "Logo redesign".to_owned(),
    }
}

#[tokio::test]
async fn employer_creates_a_room() {
    let harness = harness().await;
    let room = harness
        .service
        .create_room(create_request(&harness))
        .await
        .unwrap();

    assert_eq!(room.name, "Logo redesign");
    assert_eq!(room.employer_id, Uuid::from(harness.employer.id));
    assert_eq!(room.freelancer_id, Uuid::from(harness.freelancer.id));
}

#[tokio::test]
async fn repeated_creation_for_the_same_pair_returns_the_same_room() {
    let harness = harness().await;
    let first = harness
        .service
        .create_room(create_request(&harness))
        .await
        .unwrap();
    let second = harness
        .service
        .create_room(CreateRoomRequest {
            name: "Second attempt".to_owned(),
            ..create_request(&harness)
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    // 保留首次创建时的名字
    assert_eq!(second.name, "Logo redesign");
}

#[tokio::test]
async fn freelancer_cannot_initiate_a_room() {
    let harness = harness().await;
    let result = harness
        .service
        .create_room(CreateRoomRequest {
            employer_id: Uuid::from(harness.freelancer.id),
            freelancer_id: Uuid::from(harness.employer.id),
            name: "Reverse".to_owned(),
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::NotAnEmployer))
    ));
}

#[tokio::test]
async fn counterpart_must_be_a_freelancer() {
    let harness = harness().await;
    let other_employer = participant(ParticipantRole::Employer, "globex");
    // 直接注册第二名雇主再尝试互开房间
    let participants = Arc::new(MemoryParticipantRepository::new());
    participants.add(harness.employer.clone()).await;
    participants.add(other_employer.clone()).await;
    let service = RoomService::new(RoomServiceDependencies {
        rooms: Arc::new(MemoryRoomRepository::new()),
        participants,
        unread: Arc::new(UnreadCounts::new()),
        clock: Arc::new(FixedClock::starting_at(chrono::Utc::now())),
        operation_timeout: Duration::from_secs(1),
    });

    let result = service
        .create_room(CreateRoomRequest {
            employer_id: Uuid::from(harness.employer.id),
            freelancer_id: Uuid::from(other_employer.id),
            name: "Employers only".to_owned(),
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::NotAFreelancer))
    ));
}

#[tokio::test]
async fn unknown_caller_is_rejected() {
    let harness = harness().await;
    let result = harness
        .service
        .create_room(CreateRoomRequest {
            employer_id: Uuid::new_v4(),
            freelancer_id: Uuid::from(harness.freelancer.id),
            name: "Ghost".to_owned(),
        })
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::ParticipantNotFound))
    ));
}

#[tokio::test]
async fn freelancer_room_list_carries_employer_info_and_unread_count() {
    let harness = harness().await;
    harness
        .service
        .create_room(create_request(&harness))
        .await
        .unwrap();
    harness
        .unread
        .increment(harness.freelancer.id, harness.employer.id)
        .await;
    harness
        .unread
        .increment(harness.freelancer.id, harness.employer.id)
        .await;

    let rooms = harness
        .service
        .rooms_for_freelancer(Uuid::from(harness.freelancer.id))
        .await
        .unwrap();

    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].employer_name, "acme");
    assert_eq!(rooms[0].unread_count, 2);
}

#[tokio::test]
async fn employer_cannot_use_the_freelancer_room_list() {
    let harness = harness().await;
    let result = harness
        .service
        .rooms_for_freelancer(Uuid::from(harness.employer.id))
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::NotAFreelancer))
    ));
}
