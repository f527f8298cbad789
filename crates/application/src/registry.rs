//! 活跃房间注册表
//!
//! 进程内缓存，重启后不保留；外部登记表才是权威数据。注册表只通过下面
//! 这些方法修改，调用方需在同一临界区内完成“修改 → 读取 → 广播”。

use domain::{
    ChatDraft, ChatEvent, ConnectionId, DomainError, DomainResult, Participant, Room, RoomId,
    Timestamp,
};

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Vec<Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn find_index_by_id(&self, room_id: &RoomId) -> Option<usize> {
        self.rooms.iter().position(|room| room.id() == room_id)
    }

    pub fn get(&self, index: usize) -> Option<&Room> {
        self.rooms.get(index)
    }

    pub fn find(&self, room_id: &RoomId) -> Option<&Room> {
        self.find_index_by_id(room_id).and_then(|index| self.get(index))
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.find_index_by_id(room_id).is_some()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|room| room.id().clone()).collect()
    }

    /// 追加房间。调用方已通过外部登记表确认唯一性，这里只防止进程内重复。
    pub fn insert(&mut self, room: Room) -> DomainResult<usize> {
        if self.contains(room.id()) {
            return Err(DomainError::RoomAlreadyExists(room.id().clone()));
        }
        self.rooms.push(room);
        Ok(self.rooms.len() - 1)
    }

    pub fn remove(&mut self, room_id: &RoomId) -> Option<Room> {
        let index = self.find_index_by_id(room_id)?;
        Some(self.rooms.remove(index))
    }

    pub fn add_participant(
        &mut self,
        room_id: &RoomId,
        participant: Participant,
    ) -> DomainResult<&Room> {
        let room = self.room_mut(room_id)?;
        room.add_participant(participant)?;
        Ok(room)
    }

    pub fn append_chat(
        &mut self,
        room_id: &RoomId,
        draft: ChatDraft,
        sent_at: Timestamp,
    ) -> DomainResult<ChatEvent> {
        let room = self.room_mut(room_id)?;
        Ok(room.append_chat(draft, sent_at).clone())
    }

    /// 在所有房间中查找该连接的参与者，移除第一个匹配并返回所属房间 ID。
    pub fn remove_participant_by_connection(
        &mut self,
        connection_id: ConnectionId,
    ) -> Option<RoomId> {
        self.rooms.iter_mut().find_map(|room| {
            room.remove_participant(connection_id)
                .map(|_| room.id().clone())
        })
    }

    /// 翻转举手状态，成功时返回房间下标以便重新广播。
    pub fn toggle_hand(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> Option<usize> {
        let index = self.find_index_by_id(room_id)?;
        self.rooms[index].toggle_hand(connection_id).map(|_| index)
    }

    /// 清空注册表（测试用）
    pub fn reset(&mut self) {
        self.rooms.clear();
    }

    fn room_mut(&mut self, room_id: &RoomId) -> DomainResult<&mut Room> {
        self.rooms
            .iter_mut()
            .find(|room| room.id() == room_id)
            .ok_or_else(|| DomainError::RoomNotFound(room_id.clone()))
    }
}
