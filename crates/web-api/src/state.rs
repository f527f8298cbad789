use application::{LocalRoomBroadcaster, SessionRouter};

#[derive(Clone)]
pub struct AppState {
    pub router: SessionRouter,
    /// 连接注册在这里，路由器通过同一实例广播
    pub broadcaster: LocalRoomBroadcaster,
}

impl AppState {
    pub fn new(router: SessionRouter, broadcaster: LocalRoomBroadcaster) -> Self {
        Self {
            router,
            broadcaster,
        }
    }
}
