//! Voice Queries

/// 列出所有音色查询
#[derive(Debug, Clone, Copy, Default)]
pub struct ListVoices;
