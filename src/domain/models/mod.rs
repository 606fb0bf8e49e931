// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 线索域名（lead_domain）：合规与限流的基本单位
/// - 页面记录（page）：单次抓取的提取结果
/// - 公司画像（company）：按域名聚合的页面信息
/// - 评分记录（score）：加权评分与优先级
/// - 变更事件（change）：两次运行之间的差异
pub mod change;
pub mod company;
pub mod lead_domain;
pub mod page;
pub mod score;
