//! 会话房间准入控制。
//!
//! 只有雇主角色可以向自由职业者发起新会话；同一对参与者的
//! 重复创建是幂等的。自由职业者侧的房间列表在查询时补充雇主
//! 展示信息和当前未读数。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domain::{DomainError, Participant, RepositoryError, Room, RoomId, UserId};
use uuid::Uuid;

use crate::clock::Clock;
use crate::dto::{RoomDto, RoomSummaryDto};
use crate::error::{ApplicationError, ApplicationResult};
use crate::repository::{ParticipantRepository, RoomRepository};
use crate::unread::UnreadCounts;

#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    /// 调用方（必须是雇主）
    pub employer_id: Uuid,
    pub freelancer_id: Uuid,
    pub name: String,
}

pub struct RoomServiceDependencies {
    pub rooms: Arc<dyn RoomRepository>,
    pub participants: Arc<dyn ParticipantRepository>,
    pub unread: Arc<UnreadCounts>,
    pub clock: Arc<dyn Clock>,
    pub operation_timeout: Duration,
}

pub struct RoomService {
    deps: RoomServiceDependencies,
}

impl RoomService {
    pub fn new(deps: RoomServiceDependencies) -> Self {
        Self { deps }
    }

    async fn with_timeout<T>(
        &self,
        label: &'static str,
        fut: impl Future<Output = Result<T, RepositoryError>>,
    ) -> ApplicationResult<T> {
        match tokio::time::timeout(self.deps.operation_timeout, fut).await {
            Ok(result) => result.map_err(ApplicationError::from),
            Err(_) => Err(ApplicationError::Timeout(label)),
        }
    }

    async fn require_participant(&self, id: UserId) -> ApplicationResult<Participant> {
        let participant = self
            .with_timeout("participant lookup", self.deps.participants.find_by_id(id))
            .await?
            .ok_or(DomainError::ParticipantNotFound)?;
        Ok(participant)
    }

    /// 创建（或返回既有的）雇主 ↔ 自由职业者会话房间。
    ///
    /// 角色通过外部账号系统解析；非雇主调用以 `NotAnEmployer`
    /// 拒绝。同一对参与者重复调用返回同一个房间。
    pub async fn create_room(&self, request: CreateRoomRequest) -> ApplicationResult<RoomDto> {
        let employer_id = UserId::from(request.employer_id);
        let freelancer_id = UserId::from(request.freelancer_id);

        let caller = self.require_participant(employer_id).await?;
        if !caller.is_employer() {
            return Err(DomainError::NotAnEmployer.into());
        }

        let counterpart = self.require_participant(freelancer_id).await?;
        if !counterpart.is_freelancer() {
            return Err(DomainError::NotAFreelancer.into());
        }

        let room = Room::new(
            RoomId::from(Uuid::new_v4()),
            request.name,
            employer_id,
            freelancer_id,
            self.deps.clock.now(),
        )?;

        let stored = self
            .with_timeout("room upsert", self.deps.rooms.create_or_get(room))
            .await?;

        tracing::info!(
            room_id = %stored.id,
            employer_id = %employer_id,
            freelancer_id = %freelancer_id,
            "会话房间就绪"
        );
        Ok(RoomDto::from(&stored))
    }

    /// 自由职业者的房间列表，每项带雇主展示信息和当前未读数。
    pub async fn rooms_for_freelancer(
        &self,
        freelancer: Uuid,
    ) -> ApplicationResult<Vec<RoomSummaryDto>> {
        let freelancer_id = UserId::from(freelancer);
        let caller = self.require_participant(freelancer_id).await?;
        if !caller.is_freelancer() {
            return Err(DomainError::NotAFreelancer.into());
        }

        let rooms = self
            .with_timeout(
                "room listing",
                self.deps.rooms.list_for_freelancer(freelancer_id),
            )
            .await?;
        let unread = self.deps.unread.snapshot(freelancer_id).await;

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            let employer = match self
                .with_timeout(
                    "participant lookup",
                    self.deps.participants.find_by_id(room.employer_id),
                )
                .await?
            {
                Some(employer) => employer,
                None => {
                    tracing::warn!(employer_id = %room.employer_id, "房间雇主不存在，跳过");
                    continue;
                }
            };

            let unread_count = unread.get(&room.employer_id).copied().unwrap_or(0);
            summaries.push(RoomSummaryDto {
                room: RoomDto::from(&room),
                employer_name: employer.username,
                employer_avatar_url: employer.avatar_url,
                unread_count,
            });
        }

        Ok(summaries)
    }
}
