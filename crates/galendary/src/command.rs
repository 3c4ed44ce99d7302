//! The fixed command set.

use std::fmt;

/// Every operation a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Test,
    VerifyLogin,
    CreateUser,
    GetUser,
    GetUsername,
    ChangeUserDisplayName,
    ChangePassword,
    ResetPassword,
    DeleteUser,
    CreateGroup,
    AlterGroup,
    DissolveGroup,
    SearchGroupName,
    GetAllGroups,
    GetGroupName,
    LoadGroupMembers,
    PromoteToAdmin,
    LeaveGroup,
    GetAdminEmail,
    AddAdminEmail,
    GenerateEnrollmentCode,
    GetEnrollmentCode,
    JoinGroupByEnrollmentCode,
    CreateRequest,
    RespondRequest,
    GetRequests,
    CreateEntry,
    UpdateEntry,
    DeleteEntry,
    GetAllEntries,
    GetAllEntriesAndGroups,
    AddGroupToRelated,
    RemoveGroupFromRelated,
    GetRelatedGroups,
    GetEventsOfGroupMembers,
}

impl Command {
    /// All commands in lookup order. When two commands share a token the earlier
    /// one wins.
    pub const ALL: [Command; 35] = [
        Command::Test,
        Command::VerifyLogin,
        Command::CreateUser,
        Command::GetUser,
        Command::CreateGroup,
        Command::ChangePassword,
        Command::CreateEntry,
        Command::UpdateEntry,
        Command::DeleteEntry,
        Command::GetAllEntries,
        Command::GetAllEntriesAndGroups,
        Command::AlterGroup,
        Command::GenerateEnrollmentCode,
        Command::GetEnrollmentCode,
        Command::JoinGroupByEnrollmentCode,
        Command::LeaveGroup,
        Command::CreateRequest,
        Command::RespondRequest,
        Command::SearchGroupName,
        Command::GetAllGroups,
        Command::GetRequests,
        Command::GetUsername,
        Command::GetGroupName,
        Command::GetAdminEmail,
        Command::AddAdminEmail,
        Command::PromoteToAdmin,
        Command::LoadGroupMembers,
        Command::DissolveGroup,
        Command::AddGroupToRelated,
        Command::RemoveGroupFromRelated,
        Command::GetRelatedGroups,
        Command::GetEventsOfGroupMembers,
        Command::ChangeUserDisplayName,
        Command::ResetPassword,
        Command::DeleteUser,
    ];

    /// Canonical token.
    pub const fn name(self) -> &'static str {
        match self {
            Command::Test => "test",
            Command::VerifyLogin => "verify_login",
            Command::CreateUser => "create_user",
            Command::GetUser => "get_user",
            Command::GetUsername => "get_username",
            Command::ChangeUserDisplayName => "change_user_display_name",
            Command::ChangePassword => "change_password",
            Command::ResetPassword => "reset_password",
            Command::DeleteUser => "delete_user",
            Command::CreateGroup => "create_group",
            Command::AlterGroup => "alter_group",
            Command::DissolveGroup => "dissolve_group",
            Command::SearchGroupName => "search_group_name",
            Command::GetAllGroups => "get_all_groups",
            Command::GetGroupName => "get_group_name",
            Command::LoadGroupMembers => "load_group_members",
            Command::PromoteToAdmin => "promote_to_admin",
            Command::LeaveGroup => "leave_group",
            Command::GetAdminEmail => "get_admin_email",
            Command::AddAdminEmail => "add_admin_email",
            Command::GenerateEnrollmentCode => "generate_enrollment_code",
            Command::GetEnrollmentCode => "get_enrollment_code",
            Command::JoinGroupByEnrollmentCode => "join_group_by_enrollment_code",
            Command::CreateRequest => "create_request",
            Command::RespondRequest => "respond_request",
            Command::GetRequests => "get_requests",
            Command::CreateEntry => "create_entry",
            Command::UpdateEntry => "update_entry",
            Command::DeleteEntry => "delete_entry",
            Command::GetAllEntries => "get_all_entries",
            Command::GetAllEntriesAndGroups => "get_all_entries_and_groups",
            Command::AddGroupToRelated => "add_group_to_related",
            Command::RemoveGroupFromRelated => "remove_group_from_related",
            Command::GetRelatedGroups => "get_related_groups",
            Command::GetEventsOfGroupMembers => "get_events_of_group_members",
        }
    }

    /// Short tokens accepted in addition to the canonical name.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Command::Test => &["t"],
            Command::VerifyLogin => &["v_l"],
            Command::CreateUser => &["c_u"],
            Command::GetUser => &["g_u"],
            // "g_u" is taken by get_user
            Command::GetUsername => &[],
            Command::ChangePassword => &["c_p"],
            Command::CreateGroup => &["c_g"],
            Command::DissolveGroup => &["d_g"],
            Command::SearchGroupName => &["s_g_n"],
            Command::GetAllGroups => &["g_a_g"],
            Command::GetGroupName => &["g_g_n"],
            Command::LoadGroupMembers => &["l_g_m"],
            Command::PromoteToAdmin => &["p_t_a"],
            // "g_a_e" is taken by get_all_entries
            Command::GetAdminEmail => &[],
            Command::AddAdminEmail => &["a_a_e", "update_admin_email"],
            Command::CreateRequest => &["c_r"],
            Command::RespondRequest => &["r_r"],
            Command::GetRequests => &["g_r"],
            Command::CreateEntry => &["c_e"],
            Command::UpdateEntry => &["u_e"],
            Command::DeleteEntry => &["d_e"],
            Command::GetAllEntries => &["g_a_e"],
            Command::GetAllEntriesAndGroups => &["g_a_e_a_g"],
            Command::ChangeUserDisplayName
            | Command::ResetPassword
            | Command::DeleteUser
            | Command::AlterGroup
            | Command::LeaveGroup
            | Command::GenerateEnrollmentCode
            | Command::GetEnrollmentCode
            | Command::JoinGroupByEnrollmentCode
            | Command::AddGroupToRelated
            | Command::RemoveGroupFromRelated
            | Command::GetRelatedGroups
            | Command::GetEventsOfGroupMembers => &[],
        }
    }

    /// Resolve a token. Returns `None` for unknown and empty tokens.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|cmd| {
                cmd.name() == token || cmd.aliases().iter().any(|alias| *alias == token)
            })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
