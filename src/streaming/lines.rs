//! 字节流按行切分
//!
//! HTTP 响应体按任意边界分块到达，一行 JSON 可能跨多个 chunk，
//! 一个 chunk 也可能包含多行。`LineSplitter` 缓冲不完整的行，
//! 只输出以 `\n` 结尾的完整行，流结束时输出剩余数据。

use crate::error::UpstreamError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// 上游行流
pub type LineStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// 行切分器
#[derive(Debug)]
pub struct LineSplitter {
    /// 不完整行缓冲区
    buffer: Vec<u8>,
    /// 单行最大字节数
    max_line_bytes: usize,
}

impl LineSplitter {
    /// 创建切分器
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes,
        }
    }

    /// 当前缓冲的字节数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 追加字节并返回所有完整的行（不含换行符）
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Bytes>, UpstreamError> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            if end - start > self.max_line_bytes {
                self.buffer.clear();
                return Err(UpstreamError::LineTooLong {
                    limit: self.max_line_bytes,
                });
            }
            let line = strip_cr(&self.buffer[start..end]);
            if !line.is_empty() {
                lines.push(Bytes::copy_from_slice(line));
            }
            start = end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        if self.buffer.len() > self.max_line_bytes {
            self.buffer.clear();
            return Err(UpstreamError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }

        Ok(lines)
    }

    /// 输出缓冲区中剩余的数据
    pub fn finish(&mut self) -> Option<Bytes> {
        let rest = std::mem::take(&mut self.buffer);
        let line = strip_cr(&rest);
        if line.is_empty() {
            None
        } else {
            Some(Bytes::copy_from_slice(line))
        }
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// 将任意分块的字节流转换为行流
///
/// 源流出错时输出一次错误后结束。
pub fn split_lines<S, E>(source: S, max_line_bytes: usize) -> LineStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<UpstreamError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut splitter = LineSplitter::new(max_line_bytes);
        let mut source = Box::pin(source);

        while let Some(chunk) = source.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let err: UpstreamError = e.into();
                    yield Err(err);
                    return;
                }
            };
            match splitter.push(&chunk) {
                Ok(lines) => {
                    for line in lines {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(rest) = splitter.finish() {
            yield Ok(rest);
        }
    };

    Box::pin(stream)
}

/// 将 reqwest 响应体转换为行流
pub fn from_response(response: reqwest::Response, max_line_bytes: usize) -> LineStream {
    split_lines(response.bytes_stream(), max_line_bytes)
}

// ============================================================================
// 测试模块
// ============================================================================
