use backend_lib::auth::{
    hash_password, needs_rehash, verify_password, PasswordPolicy, PASSWORD_POLICY_MESSAGE,
};

#[test]
fn test_password_hashing_and_verification() {
    let hash = hash_password("SecureP@ssw0rd").unwrap();

    assert_ne!(hash, "SecureP@ssw0rd");
    assert!(verify_password(&hash, "SecureP@ssw0rd"));
    assert!(!verify_password(&hash, "SecureP@ssw0rD"));
    assert!(!needs_rehash(&hash));
}

#[test]
fn test_password_strength_validation() {
    let policy = PasswordPolicy::default();

    // Valid password
    assert!(policy.is_satisfied_by("SecureP@ssw0rd"));

    // Exactly the minimum length
    assert!(policy.is_satisfied_by("Sec@ssw0"));

    // Too short
    assert!(!policy.is_satisfied_by("Sh0rt!"));

    // Missing uppercase
    assert!(!policy.is_satisfied_by("securep@ssw0rd"));

    // Missing lowercase
    assert!(!policy.is_satisfied_by("SECUREP@SSW0RD"));

    // Missing digit
    assert!(!policy.is_satisfied_by("SecureP@ssword"));

    // Missing special character
    assert!(!policy.is_satisfied_by("SecurePassw0rd"));

    // Custom requirements
    let relaxed = PasswordPolicy {
        min_length: 8,
        require_uppercase: false,
        require_lowercase: true,
        require_digit: true,
        require_special: false,
    };
    assert!(relaxed.is_satisfied_by("securepassw0rd"));
}

#[test]
fn test_policy_message() {
    let err = PasswordPolicy::default().validate("password").unwrap_err();
    assert_eq!(err.to_string(), PASSWORD_POLICY_MESSAGE);
}
