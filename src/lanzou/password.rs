//! 提取码检查
//!
//! 文件与文件夹各自独立判断，不会因为文件夹有提取码就假定其中的文件也有。

use super::error::LanzouError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Open,
    Protected,
}

impl Protection {
    pub fn from_flag(protected: bool) -> Self {
        if protected {
            Protection::Protected
        } else {
            Protection::Open
        }
    }
}

/// 通过检查后的提取码，同一次解析的后续阶段都用这一个值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    /// 不需要提取码
    NotNeeded,
    /// 需要提取码，由蓝奏云在下一次请求时校验
    Password(&'a str),
}

impl<'a> Credential<'a> {
    pub fn password(&self) -> Option<&'a str> {
        match self {
            Credential::NotNeeded => None,
            Credential::Password(pwd) => Some(pwd),
        }
    }

    /// 上游拒绝请求时的错误：带了提取码说明提取码错误
    pub fn rejection(&self, otherwise: LanzouError) -> LanzouError {
        match self {
            Credential::Password(_) => LanzouError::IncorrectPassword,
            Credential::NotNeeded => otherwise,
        }
    }
}

/// 页面要求提取码但调用方没给时直接失败，不发出任何 ajax 请求
pub fn gate(protection: Protection, password: &str) -> Result<Credential<'_>, LanzouError> {
    match protection {
        Protection::Open => Ok(Credential::NotNeeded),
        Protection::Protected if password.is_empty() => Err(LanzouError::PasswordRequired),
        Protection::Protected => Ok(Credential::Password(password)),
    }
}
