//! 原生事件码表
//!
//! 原生库所有子系统的监听回调共用 `(event, data)` 形式，`event` 是下面这张表里的整数码。
//! 不在表里的码一律丢弃。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 原生监听子系统，每个子系统对应一个原生 `set_*_listener` 入口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListenerKind {
    User,
    Friend,
    Group,
    Conversation,
    AdvancedMsg,
    BatchMsg,
    CustomBusiness,
    Signaling,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 8] = [
        ListenerKind::User,
        ListenerKind::Friend,
        ListenerKind::Group,
        ListenerKind::Conversation,
        ListenerKind::AdvancedMsg,
        ListenerKind::BatchMsg,
        ListenerKind::CustomBusiness,
        ListenerKind::Signaling,
    ];

    /// 原生安装入口名
    pub fn setter_name(self) -> &'static str {
        match self {
            ListenerKind::User => "set_user_listener",
            ListenerKind::Friend => "set_friend_listener",
            ListenerKind::Group => "set_group_listener",
            ListenerKind::Conversation => "set_conversation_listener",
            ListenerKind::AdvancedMsg => "set_advanced_msg_listener",
            ListenerKind::BatchMsg => "set_batch_msg_listener",
            ListenerKind::CustomBusiness => "set_custom_business_listener",
            ListenerKind::Signaling => "set_signaling_listener",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.setter_name())
    }
}

/// 原生事件
///
/// 判别值即原生事件码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum NativeEvent {
    // 连接（init_sdk 监听）
    Connecting = 0,
    ConnectSuccess = 1,
    ConnectFailed = 2,
    KickedOffline = 3,
    UserTokenExpired = 4,
    UserTokenInvalid = 5,
    // 群组
    JoinedGroupAdded = 6,
    JoinedGroupDeleted = 7,
    GroupMemberAdded = 8,
    GroupMemberDeleted = 9,
    GroupApplicationAdded = 10,
    GroupApplicationDeleted = 11,
    GroupInfoChanged = 12,
    GroupDismissed = 13,
    GroupMemberInfoChanged = 14,
    GroupApplicationAccepted = 15,
    GroupApplicationRejected = 16,
    // 好友
    FriendApplicationAdded = 17,
    FriendApplicationDeleted = 18,
    FriendApplicationAccepted = 19,
    FriendApplicationRejected = 20,
    FriendAdded = 21,
    FriendDeleted = 22,
    FriendInfoChanged = 23,
    BlackAdded = 24,
    BlackDeleted = 25,
    // 同步
    SyncServerStart = 26,
    SyncServerFinish = 27,
    SyncServerProgress = 28,
    SyncServerFailed = 29,
    // 会话
    NewConversation = 30,
    ConversationChanged = 31,
    TotalUnreadMessageCountChanged = 32,
    // 消息
    RecvNewMessage = 33,
    RecvC2CReadReceipt = 34,
    RecvGroupReadReceipt = 35,
    NewRecvMessageRevoked = 36,
    RecvMessageExtensionsChanged = 37,
    RecvMessageExtensionsDeleted = 38,
    RecvMessageExtensionsAdded = 39,
    RecvOfflineNewMessage = 40,
    MsgDeleted = 41,
    RecvNewMessages = 42,
    RecvOfflineNewMessages = 43,
    // 用户
    SelfInfoUpdated = 44,
    UserStatusChanged = 45,
    RecvCustomBusinessMessage = 46,
    MessageKvInfoChanged = 47,
    ConversationUserInputStatusChanged = 48,
    RecvOnlineOnlyMessage = 49,
    Progress = 50,
    // 信令
    ReceiveNewInvitation = 51,
    InviteeAccepted = 52,
    InviteeAcceptedByOtherDevice = 53,
    InviteeRejected = 54,
    InviteeRejectedByOtherDevice = 55,
    InvitationCancelled = 56,
    InvitationTimeout = 57,
    HangUp = 58,
    RoomParticipantConnected = 59,
    RoomParticipantDisconnected = 60,
    StreamChange = 61,
    ReceiveCustomSignal = 62,
}

impl NativeEvent {
    pub const ALL: [NativeEvent; 63] = [
        NativeEvent::Connecting,
        NativeEvent::ConnectSuccess,
        NativeEvent::ConnectFailed,
        NativeEvent::KickedOffline,
        NativeEvent::UserTokenExpired,
        NativeEvent::UserTokenInvalid,
        NativeEvent::JoinedGroupAdded,
        NativeEvent::JoinedGroupDeleted,
        NativeEvent::GroupMemberAdded,
        NativeEvent::GroupMemberDeleted,
        NativeEvent::GroupApplicationAdded,
        NativeEvent::GroupApplicationDeleted,
        NativeEvent::GroupInfoChanged,
        NativeEvent::GroupDismissed,
        NativeEvent::GroupMemberInfoChanged,
        NativeEvent::GroupApplicationAccepted,
        NativeEvent::GroupApplicationRejected,
        NativeEvent::FriendApplicationAdded,
        NativeEvent::FriendApplicationDeleted,
        NativeEvent::FriendApplicationAccepted,
        NativeEvent::FriendApplicationRejected,
        NativeEvent::FriendAdded,
        NativeEvent::FriendDeleted,
        NativeEvent::FriendInfoChanged,
        NativeEvent::BlackAdded,
        NativeEvent::BlackDeleted,
        NativeEvent::SyncServerStart,
        NativeEvent::SyncServerFinish,
        NativeEvent::SyncServerProgress,
        NativeEvent::SyncServerFailed,
        NativeEvent::NewConversation,
        NativeEvent::ConversationChanged,
        NativeEvent::TotalUnreadMessageCountChanged,
        NativeEvent::RecvNewMessage,
        NativeEvent::RecvC2CReadReceipt,
        NativeEvent::RecvGroupReadReceipt,
        NativeEvent::NewRecvMessageRevoked,
        NativeEvent::RecvMessageExtensionsChanged,
        NativeEvent::RecvMessageExtensionsDeleted,
        NativeEvent::RecvMessageExtensionsAdded,
        NativeEvent::RecvOfflineNewMessage,
        NativeEvent::MsgDeleted,
        NativeEvent::RecvNewMessages,
        NativeEvent::RecvOfflineNewMessages,
        NativeEvent::SelfInfoUpdated,
        NativeEvent::UserStatusChanged,
        NativeEvent::RecvCustomBusinessMessage,
        NativeEvent::MessageKvInfoChanged,
        NativeEvent::ConversationUserInputStatusChanged,
        NativeEvent::RecvOnlineOnlyMessage,
        NativeEvent::Progress,
        NativeEvent::ReceiveNewInvitation,
        NativeEvent::InviteeAccepted,
        NativeEvent::InviteeAcceptedByOtherDevice,
        NativeEvent::InviteeRejected,
        NativeEvent::InviteeRejectedByOtherDevice,
        NativeEvent::InvitationCancelled,
        NativeEvent::InvitationTimeout,
        NativeEvent::HangUp,
        NativeEvent::RoomParticipantConnected,
        NativeEvent::RoomParticipantDisconnected,
        NativeEvent::StreamChange,
        NativeEvent::ReceiveCustomSignal,
    ];

    /// 按事件码查表；未知码返回 `None`
    pub fn from_code(code: i32) -> Option<Self> {
        // 表按事件码连续排列
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// 按事件名查表
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.name() == name)
    }

    /// 对外的事件名
    pub fn name(self) -> &'static str {
        match self {
            NativeEvent::Connecting => "OnConnecting",
            NativeEvent::ConnectSuccess => "OnConnectSuccess",
            NativeEvent::ConnectFailed => "OnConnectFailed",
            NativeEvent::KickedOffline => "OnKickedOffline",
            NativeEvent::UserTokenExpired => "OnUserTokenExpired",
            NativeEvent::UserTokenInvalid => "OnUserTokenInvalid",
            NativeEvent::JoinedGroupAdded => "OnJoinedGroupAdded",
            NativeEvent::JoinedGroupDeleted => "OnJoinedGroupDeleted",
            NativeEvent::GroupMemberAdded => "OnGroupMemberAdded",
            NativeEvent::GroupMemberDeleted => "OnGroupMemberDeleted",
            NativeEvent::GroupApplicationAdded => "OnGroupApplicationAdded",
            NativeEvent::GroupApplicationDeleted => "OnGroupApplicationDeleted",
            NativeEvent::GroupInfoChanged => "OnGroupInfoChanged",
            NativeEvent::GroupDismissed => "OnGroupDismissed",
            NativeEvent::GroupMemberInfoChanged => "OnGroupMemberInfoChanged",
            NativeEvent::GroupApplicationAccepted => "OnGroupApplicationAccepted",
            NativeEvent::GroupApplicationRejected => "OnGroupApplicationRejected",
            NativeEvent::FriendApplicationAdded => "OnFriendApplicationAdded",
            NativeEvent::FriendApplicationDeleted => "OnFriendApplicationDeleted",
            NativeEvent::FriendApplicationAccepted => "OnFriendApplicationAccepted",
            NativeEvent::FriendApplicationRejected => "OnFriendApplicationRejected",
            NativeEvent::FriendAdded => "OnFriendAdded",
            NativeEvent::FriendDeleted => "OnFriendDeleted",
            NativeEvent::FriendInfoChanged => "OnFriendInfoChanged",
            NativeEvent::BlackAdded => "OnBlackAdded",
            NativeEvent::BlackDeleted => "OnBlackDeleted",
            NativeEvent::SyncServerStart => "OnSyncServerStart",
            NativeEvent::SyncServerFinish => "OnSyncServerFinish",
            NativeEvent::SyncServerProgress => "OnSyncServerProgress",
            NativeEvent::SyncServerFailed => "OnSyncServerFailed",
            NativeEvent::NewConversation => "OnNewConversation",
            NativeEvent::ConversationChanged => "OnConversationChanged",
            NativeEvent::TotalUnreadMessageCountChanged => "OnTotalUnreadMessageCountChanged",
            NativeEvent::RecvNewMessage => "OnRecvNewMessage",
            NativeEvent::RecvC2CReadReceipt => "OnRecvC2CReadReceipt",
            NativeEvent::RecvGroupReadReceipt => "OnRecvGroupReadReceipt",
            NativeEvent::NewRecvMessageRevoked => "OnNewRecvMessageRevoked",
            NativeEvent::RecvMessageExtensionsChanged => "OnRecvMessageExtensionsChanged",
            NativeEvent::RecvMessageExtensionsDeleted => "OnRecvMessageExtensionsDeleted",
            NativeEvent::RecvMessageExtensionsAdded => "OnRecvMessageExtensionsAdded",
            NativeEvent::RecvOfflineNewMessage => "OnRecvOfflineNewMessage",
            NativeEvent::MsgDeleted => "OnMsgDeleted",
            NativeEvent::RecvNewMessages => "OnRecvNewMessages",
            NativeEvent::RecvOfflineNewMessages => "OnRecvOfflineNewMessages",
            NativeEvent::SelfInfoUpdated => "OnSelfInfoUpdated",
            NativeEvent::UserStatusChanged => "OnUserStatusChanged",
            NativeEvent::RecvCustomBusinessMessage => "OnRecvCustomBusinessMessage",
            NativeEvent::MessageKvInfoChanged => "OnMessageKvInfoChanged",
            NativeEvent::ConversationUserInputStatusChanged => "OnConversationUserInputStatusChanged",
            NativeEvent::RecvOnlineOnlyMessage => "OnRecvOnlineOnlyMessage",
            NativeEvent::Progress => "OnProgress",
            NativeEvent::ReceiveNewInvitation => "OnReceiveNewInvitation",
            NativeEvent::InviteeAccepted => "OnInviteeAccepted",
            NativeEvent::InviteeAcceptedByOtherDevice => "OnInviteeAcceptedByOtherDevice",
            NativeEvent::InviteeRejected => "OnInviteeRejected",
            NativeEvent::InviteeRejectedByOtherDevice => "OnInviteeRejectedByOtherDevice",
            NativeEvent::InvitationCancelled => "OnInvitationCancelled",
            NativeEvent::InvitationTimeout => "OnInvitationTimeout",
            NativeEvent::HangUp => "OnHangUp",
            NativeEvent::RoomParticipantConnected => "OnRoomParticipantConnected",
            NativeEvent::RoomParticipantDisconnected => "OnRoomParticipantDisconnected",
            NativeEvent::StreamChange => "OnStreamChange",
            NativeEvent::ReceiveCustomSignal => "OnReceiveCustomSignal",
        }
    }

    /// 事件所属的监听子系统
    ///
    /// 连接与同步事件走 init_sdk 安装的监听回调，不属于任何 `set_*_listener`。
    pub fn category(self) -> Option<ListenerKind> {
        match self.code() {
            0..=5 | 26..=29 => None,
            6..=16 => Some(ListenerKind::Group),
            17..=25 => Some(ListenerKind::Friend),
            30..=32 | 48 => Some(ListenerKind::Conversation),
            33..=41 | 47 | 49 | 50 => Some(ListenerKind::AdvancedMsg),
            42 | 43 => Some(ListenerKind::BatchMsg),
            44 | 45 => Some(ListenerKind::User),
            46 => Some(ListenerKind::CustomBusiness),
            _ => Some(ListenerKind::Signaling),
        }
    }
}

impl fmt::Display for NativeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_is_dense() {
        for (idx, event) in NativeEvent::ALL.iter().enumerate() {
            assert_eq!(event.code(), idx as i32, "{} out of place", event);
            assert_eq!(NativeEvent::from_code(event.code()), Some(*event));
        }
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(NativeEvent::from_code(-1), None);
        assert_eq!(NativeEvent::from_code(63), None);
        assert_eq!(NativeEvent::from_code(i32::MAX), None);
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = NativeEvent::ALL.iter().map(|e| e.name()).collect();
        assert_eq!(names.len(), NativeEvent::ALL.len());
        assert_eq!(NativeEvent::from_name("OnRecvNewMessage"), Some(NativeEvent::RecvNewMessage));
        assert_eq!(NativeEvent::from_name("OnNothing"), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(NativeEvent::ConnectSuccess.category(), None);
        assert_eq!(NativeEvent::RecvNewMessage.category(), Some(ListenerKind::AdvancedMsg));
        assert_eq!(NativeEvent::RecvNewMessages.category(), Some(ListenerKind::BatchMsg));
        assert_eq!(NativeEvent::FriendAdded.category(), Some(ListenerKind::Friend));
        assert_eq!(NativeEvent::HangUp.category(), Some(ListenerKind::Signaling));
        for kind in ListenerKind::ALL {
            assert!(
                NativeEvent::ALL.iter().any(|e| e.category() == Some(kind)),
                "{} has no events",
                kind
            );
        }
    }
}
