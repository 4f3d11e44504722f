//! WebSocket 连接生命周期。
//!
//! 每条连接分成两个任务：写任务独占 socket 发送端并排空注册表
//! 分配的发送队列；读循环解析客户端事件并分发给用例服务。
//! 清理只有一条路径：读循环退出后注销连接并广播下线转换，
//! 保证同一连接至多产生一次下线。

use std::time::Duration;

use application::registry::PushError;
use application::services::SendMessageRequest;
use application::{ClientEvent, ConnectionHandle, RegisteredConnection, ServerEvent};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{FileAttachment, UserId};
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn serve(socket: WebSocket, state: AppState, user_id: Uuid) {
    let user_id = UserId::from(user_id);
    let RegisteredConnection {
        handle,
        mut events,
        transition,
    } = state.registry.register(user_id).await;
    state.presence.handle_transition(user_id, transition).await;

    tracing::info!(
        user_id = %user_id,
        connection_id = %handle.id(),
        "WebSocket 连接已建立"
    );

    let (mut sender, mut incoming) = socket.split();

    // 写任务：唯一持有 socket 发送端
    let writer_handle = handle.clone();
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let payload = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::warn!(error = %err, "事件序列化失败");
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                        writer_handle.close();
                        break;
                    }
                }
                _ = writer_handle.wait_closed() => {
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    // 读循环：空闲超时的连接由服务端主动关闭
    let idle_timeout = Duration::from_secs(state.realtime.heartbeat_timeout_secs);
    loop {
        let next = tokio::select! {
            _ = handle.wait_closed() => break,
            next = tokio::time::timeout(idle_timeout, incoming.next()) => next,
        };

        match next {
            Err(_) => {
                tracing::info!(
                    user_id = %user_id,
                    connection_id = %handle.id(),
                    "连接空闲超时，主动关闭"
                );
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                tracing::debug!(error = %err, "WebSocket 读取失败");
                break;
            }
            Ok(Some(Ok(message))) => match message {
                WsMessage::Close(_) => break,
                // 协议层 Ping/Pong 由底层自动应答，这里只当作活跃信号
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) => {}
                WsMessage::Text(text) => {
                    dispatch(&state, &handle, user_id, text.as_str()).await;
                }
            },
        }
    }

    // 唯一的清理路径
    handle.close();
    let transition = state.registry.unregister(&handle).await;
    state.presence.handle_transition(user_id, transition).await;
    let _ = send_task.await;

    tracing::info!(
        user_id = %user_id,
        connection_id = %handle.id(),
        "WebSocket 连接已断开"
    );
}

/// 解析并分发一条客户端事件。失败以错误事件回给本连接，从不中断连接。
async fn dispatch(state: &AppState, handle: &ConnectionHandle, user_id: UserId, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            push_event(
                handle,
                ServerEvent::error("INVALID_EVENT", format!("malformed event: {err}")),
            );
            return;
        }
    };

    let result = handle_event(state, handle, user_id, event).await;
    if let Err(err) = result {
        push_event(handle, ServerEvent::error(err.code(), err.message()));
    }
}

async fn handle_event(
    state: &AppState,
    handle: &ConnectionHandle,
    user_id: UserId,
    event: ClientEvent,
) -> Result<(), ApiError> {
    match event {
        ClientEvent::SendMessage {
            id,
            sender_id,
            receiver_id,
            text,
            file_url,
            file_name,
            file_type,
        } => {
            // 发送身份由连接的认证结果决定，不信任负载里的 senderId
            if sender_id != Uuid::from(user_id) {
                return Err(ApiError::new(
                    axum::http::StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "senderId must match the authenticated user",
                ));
            }

            let attachment = file_url.map(|url| FileAttachment {
                url,
                name: file_name.unwrap_or_default(),
                mime_type: file_type.unwrap_or_default(),
            });

            state
                .chat_service
                .send_message(SendMessageRequest {
                    message_id: id,
                    sender_id,
                    receiver_id,
                    text,
                    attachment,
                })
                .await?;
        }
        ClientEvent::MarkAsRead {
            sender_id,
            receiver_id,
        } => {
            // receiverId 是读者本人
            if receiver_id != Uuid::from(user_id) {
                return Err(ApiError::new(
                    axum::http::StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "receiverId must match the authenticated user",
                ));
            }
            state.chat_service.mark_read(receiver_id, sender_id).await?;
        }
        ClientEvent::Typing { receiver_id } => {
            state
                .chat_service
                .notify_typing(Uuid::from(user_id), receiver_id)
                .await;
        }
        ClientEvent::StopTyping { receiver_id } => {
            state
                .chat_service
                .notify_stop_typing(Uuid::from(user_id), receiver_id)
                .await;
        }
        ClientEvent::JoinRoom { room_id } => {
            // 聚焦信号：准入在 REST 侧完成，这里只记录
            tracing::debug!(user_id = %user_id, room_id = %room_id, "客户端进入会话");
        }
        ClientEvent::RequestOnlineUsers => {
            let snapshot = state.presence.subscribe(handle).await;
            push_event(handle, snapshot);
        }
    }
    Ok(())
}

fn push_event(handle: &ConnectionHandle, event: ServerEvent) {
    match handle.push(event) {
        Ok(()) => {}
        Err(PushError::Closed) => {}
        // 队列写满按慢客户端处理：断开本连接，不阻塞其他连接
        Err(PushError::QueueFull) => handle.close(),
    }
}
