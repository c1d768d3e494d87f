use crate::models::{NewUser, UserDto};

/// UserMapper
///
/// Structural copy of the scalar fields shared by `UserDto` and the user record.
/// Roles and password encoding are left to the service.
pub struct UserMapper;

impl UserMapper {
    /// New accounts are always created enabled with an empty role set; the password is
    /// copied verbatim and must be encoded before persisting.
    pub fn to_model(dto: &UserDto) -> NewUser {
        NewUser {
            firstname: dto.firstname.clone(),
            lastname: dto.lastname.clone(),
            age: dto.age,
            email: dto.email.clone(),
            password: dto.password.clone(),
            enabled: true,
            roles: Default::default(),
        }
    }
}
