//! 可取消的外部任務
//!
//! 子程序的標準輸出由背景執行緒逐行讀取，轉成 [`ProgressEvent`] 送入通道；
//! 呼叫端從通道取得進度，不會阻塞子程序本身。

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::io::{BufRead, BufReader, Read};
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// 工具回報已完成的步數
    Step(u64),
    /// 無法解析成步數的輸出行
    Output(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed { code: Option<i32>, message: String },
}

enum Process {
    Child {
        child: Child,
        stderr: Option<JoinHandle<String>>,
    },
    Thread {
        handle: JoinHandle<Result<()>>,
        cancelled: Arc<AtomicBool>,
    },
}

pub struct TaskHandle {
    events: Receiver<ProgressEvent>,
    process: Process,
}

impl TaskHandle {
    /// 接管已啟動的子程序；`parse_line` 將每行標準輸出轉成進度事件
    pub fn from_child<F>(mut child: Child, parse_line: F) -> Self
    where
        F: Fn(&str) -> ProgressEvent + Send + 'static,
    {
        let (sender, events) = unbounded();

        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines().map_while(Result::ok) {
                    if sender.send(parse_line(line.trim_end())).is_err() {
                        break;
                    }
                }
            });
        }

        // stderr 需持續讀取，避免管線緩衝區塞滿使子程序停住
        let stderr = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = BufReader::new(stderr).read_to_string(&mut buffer);
                buffer
            })
        });

        Self {
            events,
            process: Process::Child { child, stderr },
        }
    }

    /// 在背景執行緒執行行程內任務；任務應定期檢查取消旗標
    pub fn spawn_fn<F>(task: F) -> Self
    where
        F: FnOnce(&Sender<ProgressEvent>, &AtomicBool) -> Result<()> + Send + 'static,
    {
        let (sender, events) = unbounded();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = thread::spawn(move || task(&sender, &flag));

        Self {
            events,
            process: Process::Thread { handle, cancelled },
        }
    }

    /// 進度事件；任務輸出結束後通道會斷線
    #[must_use]
    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    pub fn cancel(&mut self) {
        match &mut self.process {
            Process::Child { child, .. } => {
                let _ = child.kill();
            }
            Process::Thread { cancelled, .. } => cancelled.store(true, Ordering::SeqCst),
        }
    }

    /// 不阻塞地檢查任務是否已結束
    pub fn is_finished(&mut self) -> Result<bool> {
        match &mut self.process {
            Process::Child { child, .. } => {
                let status = child.try_wait().context("無法檢查子程序狀態")?;
                Ok(status.is_some())
            }
            Process::Thread { handle, .. } => Ok(handle.is_finished()),
        }
    }

    /// 等待任務結束並回報結果
    pub fn wait(self) -> Result<TaskOutcome> {
        match self.process {
            Process::Child { mut child, stderr } => {
                let status = child.wait().context("無法等待子程序結束")?;
                let message = stderr
                    .and_then(|handle| handle.join().ok())
                    .unwrap_or_default();

                if status.success() {
                    Ok(TaskOutcome::Success)
                } else {
                    Ok(TaskOutcome::Failed {
                        code: status.code(),
                        message: message.trim().to_string(),
                    })
                }
            }
            Process::Thread { handle, .. } => Ok(match handle.join() {
                Ok(Ok(())) => TaskOutcome::Success,
                Ok(Err(e)) => TaskOutcome::Failed {
                    code: None,
                    message: format!("{e:#}"),
                },
                Err(_) => TaskOutcome::Failed {
                    code: None,
                    message: "任務執行緒 panic".to_string(),
                },
            }),
        }
    }
}
